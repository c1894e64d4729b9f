//! Static exchange evaluation.

use super::Position;
use crate::types::{Bitboard, Move, PieceType, Square, Value};

/// Exchange values. The king is priced high enough that "capturing" it
/// never looks acceptable for the other side.
const SEE_VALUES: [Value; 6] = [100, 422, 437, 694, 1350, 20000];

#[inline]
fn see_value(pt: PieceType) -> Value {
    SEE_VALUES[pt.index()]
}

impl Position {
    /// Material balance of the capture sequence on `m.to()`, assuming both
    /// sides always recapture with their least valuable attacker and stop
    /// when recapturing loses material. X-ray attackers are re-introduced
    /// as front pieces move off the line.
    #[must_use]
    pub fn see(&self, m: Move) -> Value {
        // Castling never trades material; the rook square is not a target.
        if m.is_castling() {
            return 0;
        }

        let from = m.from();
        let to = m.to();
        let us = match self.piece_on(from) {
            Some(pc) => pc.color(),
            None => return 0,
        };

        let mut gain = [0 as Value; 32];
        let mut occ = self.occupied() ^ Bitboard::from_square(from);
        let mut attacker_pt = self
            .piece_on(from)
            .map_or(PieceType::Pawn, |p| p.piece_type());

        gain[0] = if m.is_en_passant() {
            let capsq = to.offset(-us.push());
            occ ^= Bitboard::from_square(capsq);
            see_value(PieceType::Pawn)
        } else {
            self.piece_on(to).map_or(0, |p| see_value(p.piece_type()))
        };

        let mut stm = !us;
        let mut depth = 0usize;

        loop {
            // Recomputing under the shrinking occupancy naturally reveals
            // x-ray attackers behind the piece that just moved.
            let attackers = self.attackers_to_occ(to, occ) & occ;
            let stm_attackers = attackers & self.pieces_c(stm);
            if stm_attackers.is_empty() || depth + 1 >= gain.len() {
                break;
            }

            let (lva_sq, lva_pt) = least_valuable(self, stm_attackers);
            depth += 1;
            gain[depth] = see_value(attacker_pt) - gain[depth - 1];
            if gain[depth].max(-gain[depth - 1]) < 0 {
                break;
            }

            occ ^= Bitboard::from_square(lva_sq);
            attacker_pt = lva_pt;
            stm = !stm;
        }

        while depth > 0 {
            gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
            depth -= 1;
        }
        gain[0]
    }
}

fn least_valuable(pos: &Position, attackers: Bitboard) -> (Square, PieceType) {
    for pt in PieceType::ALL {
        let subset = attackers & pos.pieces(pt);
        if !subset.is_empty() {
            return (subset.lsb(), pt);
        }
    }
    unreachable!("attackers bitboard was checked non-empty");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::types::Square;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn free_capture_wins_the_piece() {
        let pos = Position::from_fen("4k3/8/8/3q4/8/8/3R4/3K4 b - - 0 1", false).unwrap();
        // Queen takes an undefended rook.
        let m = Move::new(sq("d5"), sq("d2"));
        assert_eq!(pos.see(m), see_value(PieceType::Rook) - see_value(PieceType::Queen));

        let pos = Position::from_fen("4k3/8/8/3q4/8/8/3R4/3K4 w - - 0 1", false).unwrap();
        // Rook takes a queen defended by nothing.
        let m = Move::new(sq("d2"), sq("d5"));
        assert_eq!(pos.see(m), see_value(PieceType::Queen));
    }

    #[test]
    fn defended_pawn_loses_the_queen() {
        let pos =
            Position::from_fen("4k3/3p4/2p5/3p4/8/8/8/3QK3 w - - 0 1", false).unwrap();
        let m = Move::new(sq("d1"), sq("d5"));
        assert_eq!(
            pos.see(m),
            see_value(PieceType::Pawn) - see_value(PieceType::Queen)
        );
    }

    #[test]
    fn xray_attackers_join_the_exchange() {
        // Doubled rooks versus a lone rook on an open file: the second
        // white rook backs up the first.
        let pos =
            Position::from_fen("3r3k/8/8/3p4/8/8/3R4/3R2K1 w - - 0 1", false).unwrap();
        let m = Move::new(sq("d2"), sq("d5"));
        // RxP, rxR, RxR: +100 -694 +694 = +100.
        assert_eq!(pos.see(m), 100);
    }

    #[test]
    fn see_monotone_in_captured_value() {
        // Same exchange structure, bigger target cannot score lower.
        let small =
            Position::from_fen("3r3k/8/8/3n4/8/8/3R4/3K4 w - - 0 1", false).unwrap();
        let big =
            Position::from_fen("3r3k/8/8/3q4/8/8/3R4/3K4 w - - 0 1", false).unwrap();
        let m = Move::new(sq("d2"), sq("d5"));
        assert!(big.see(m) >= small.see(m));
    }

    #[test]
    fn quiet_move_sees_zero_or_loss() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/3R4/3K4 w - - 0 1", false).unwrap();
        // Rook to an unattacked empty square: nothing gained or lost.
        assert_eq!(pos.see(Move::new(sq("d2"), sq("d4"))), 0);
    }
}
