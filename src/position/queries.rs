//! Attack queries, pseudolegality and legality filters.

use super::attacks;
use super::Position;
use crate::types::{Bitboard, Color, Move, MoveKind, PieceType, Square};

impl Position {
    /// Every piece of either color attacking `sq` under the given
    /// occupancy. Pieces absent from `occ` still attack; callers mask with
    /// `occ` when they need only the remaining ones.
    #[must_use]
    pub fn attackers_to_occ(&self, sq: Square, occ: Bitboard) -> Bitboard {
        (attacks::pawn_attacks(Color::White, sq) & self.pieces_cp(Color::Black, PieceType::Pawn))
            | (attacks::pawn_attacks(Color::Black, sq)
                & self.pieces_cp(Color::White, PieceType::Pawn))
            | (attacks::knight_attacks(sq) & self.pieces(PieceType::Knight))
            | (attacks::rook_attacks(sq, occ)
                & (self.pieces(PieceType::Rook) | self.pieces(PieceType::Queen)))
            | (attacks::bishop_attacks(sq, occ)
                & (self.pieces(PieceType::Bishop) | self.pieces(PieceType::Queen)))
            | (attacks::king_attacks(sq) & self.pieces(PieceType::King))
    }

    #[inline]
    #[must_use]
    pub fn attackers_to(&self, sq: Square) -> Bitboard {
        self.attackers_to_occ(sq, self.occupied())
    }

    /// Pieces of either color that alone shield `ksq` from a slider of
    /// `sliders_of`, together with the sliders of that color doing the
    /// pinning of same-colored blockers.
    pub(crate) fn slider_blockers(
        &self,
        sliders_of: Color,
        ksq: Square,
    ) -> (Bitboard, Bitboard) {
        let mut blockers = Bitboard::EMPTY;
        let mut pinners = Bitboard::EMPTY;

        let rooks = self.pieces(PieceType::Rook) | self.pieces(PieceType::Queen);
        let bishops = self.pieces(PieceType::Bishop) | self.pieces(PieceType::Queen);
        let snipers = ((attacks::rook_attacks(ksq, Bitboard::EMPTY) & rooks)
            | (attacks::bishop_attacks(ksq, Bitboard::EMPTY) & bishops))
            & self.pieces_c(sliders_of);
        let occupancy = self.occupied() ^ snipers;
        let king_owner = !sliders_of;

        for sniper in snipers {
            let b = attacks::between_bb(ksq, sniper) & occupancy;
            if !b.is_empty() && !b.more_than_one() {
                blockers |= b;
                if !(b & self.pieces_c(king_owner)).is_empty() {
                    pinners.set(sniper);
                }
            }
        }
        (blockers, pinners)
    }

    /// Geometry, occupancy and turn checks only: the returned move may
    /// still leave the own king in check. Used to vet moves coming from
    /// the transposition table and the killer slots.
    #[must_use]
    pub fn is_pseudolegal(&self, m: Move) -> bool {
        if !m.is_ok() {
            return false;
        }
        let us = self.side_to_move();
        let them = !us;
        let from = m.from();
        let to = m.to();
        let Some(pc) = self.piece_on(from) else {
            return false;
        };
        if pc.color() != us {
            return false;
        }
        let pt = pc.piece_type();
        let occ = self.occupied();

        match m.kind() {
            MoveKind::Castling => {
                if pt != PieceType::King || self.in_check() {
                    return false;
                }
                let kingside = to.index() > from.index();
                let right = castle_right(us, kingside);
                return self.can_castle(right)
                    && self.castling_rook(right) == Some(to)
                    && self.castling_path_clear(right);
            }
            MoveKind::EnPassant => {
                if pt != PieceType::Pawn
                    || self.ep_square() != Some(to)
                    || !attacks::pawn_attacks(us, from).contains(to)
                {
                    return false;
                }
            }
            MoveKind::Promotion => {
                if pt != PieceType::Pawn || from.relative_rank(us) != 6 {
                    return false;
                }
                if !self.pawn_move_ok(us, from, to) {
                    return false;
                }
            }
            MoveKind::Normal => {
                if self.pieces_c(us).contains(to) {
                    return false;
                }
                if pt == PieceType::Pawn {
                    // Moves to the back rank must carry a promotion tag.
                    if to.relative_rank(us) == 7 || !self.pawn_move_ok(us, from, to) {
                        return false;
                    }
                } else if !attacks::attacks_bb(pt, from, occ).contains(to) {
                    return false;
                }
            }
        }

        // While in check only king moves and single-checker blocks or
        // captures survive.
        if self.in_check() && !m.is_castling() {
            if pt != PieceType::King {
                if self.checkers().more_than_one() {
                    return false;
                }
                let target = attacks::between_bb(self.king_square(us), self.checkers().lsb());
                // The en-passant target square never coincides with the
                // checker, so ep evasions are vetted conservatively here
                // and confirmed by the legality check.
                if m.is_en_passant() {
                    let capsq = to.offset(-us.push());
                    if !self.checkers().contains(capsq) && !target.contains(to) {
                        return false;
                    }
                } else if !target.contains(to) {
                    return false;
                }
            } else if !(self.attackers_to_occ(to, occ ^ Bitboard::from_square(from))
                & self.pieces_c(them))
            .is_empty()
            {
                return false;
            }
        }
        true
    }

    /// Explicit set-membership checks for pawn pushes and captures.
    fn pawn_move_ok(&self, us: Color, from: Square, to: Square) -> bool {
        let them = !us;
        let push = us.push();
        let occ = self.occupied();

        if attacks::pawn_attacks(us, from).contains(to) {
            return self.pieces_c(them).contains(to);
        }
        let single = from.offset(push);
        if to == single {
            return !occ.contains(single);
        }
        if from.relative_rank(us) == 1 && to == single.offset(push) {
            return !occ.contains(single) && !occ.contains(to);
        }
        false
    }

    /// Full legality on top of pseudolegality: the own king must not be
    /// left in check, including the en-passant discovered-check case and
    /// attacked castling transit squares.
    #[must_use]
    pub fn is_legal(&self, m: Move) -> bool {
        let us = self.side_to_move();
        let them = !us;
        let from = m.from();
        let to = m.to();
        let ksq = self.king_square(us);

        match m.kind() {
            MoveKind::EnPassant => {
                // Both pawns leave the rank; a rook or queen may suddenly
                // see the king.
                let capsq = to.offset(-us.push());
                let occ = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(capsq))
                    | Bitboard::from_square(to);
                let rooks = self.pieces_cp(them, PieceType::Rook)
                    | self.pieces_cp(them, PieceType::Queen);
                let bishops = self.pieces_cp(them, PieceType::Bishop)
                    | self.pieces_cp(them, PieceType::Queen);
                (attacks::rook_attacks(ksq, occ) & rooks).is_empty()
                    && (attacks::bishop_attacks(ksq, occ) & bishops).is_empty()
            }
            MoveKind::Castling => {
                let kingside = to.index() > from.index();
                let king_to = Square::make(if kingside { 6 } else { 2 }, from.rank());
                // Walk the king's path; no square on it may be attacked.
                let mut sq = king_to;
                loop {
                    if !(self.attackers_to(sq) & self.pieces_c(them)).is_empty() {
                        return false;
                    }
                    if sq == from {
                        break;
                    }
                    sq = if king_to.index() > from.index() {
                        sq.offset(-1)
                    } else {
                        sq.offset(1)
                    };
                }
                // In Chess960 the rook itself may be the piece shielding
                // the king.
                !self.is_chess960() || !self.blockers_for_king(us).contains(to)
            }
            _ if self.piece_on(from).map(|p| p.piece_type()) == Some(PieceType::King) => {
                (self.attackers_to_occ(to, self.occupied() ^ Bitboard::from_square(from))
                    & self.pieces_c(them))
                .is_empty()
            }
            _ => {
                !self.blockers_for_king(us).contains(from)
                    || attacks::aligned(from, to, ksq)
            }
        }
    }

    /// Does `m` give check? Answered from the precomputed check squares
    /// plus discovered-check geometry; the special move kinds recompute
    /// occupancy.
    #[must_use]
    pub fn gives_check(&self, m: Move) -> bool {
        let us = self.side_to_move();
        let them = !us;
        let from = m.from();
        let to = m.to();
        let ksq = self.king_square(them);
        let pt = self
            .piece_on(from)
            .map_or(PieceType::King, |p| p.piece_type());

        // Direct check from the destination square.
        if !m.is_castling() && !m.is_promotion() && self.check_squares(pt).contains(to) {
            return true;
        }

        // Discovered check: a blocker steps off the king's line.
        if self.blockers_for_king(them).contains(from) && !attacks::aligned(from, to, ksq) {
            return true;
        }

        match m.kind() {
            MoveKind::Normal => false,
            MoveKind::Promotion => {
                let occ = self.occupied() ^ Bitboard::from_square(from);
                attacks::attacks_bb(m.promotion_type(), to, occ).contains(ksq)
            }
            MoveKind::EnPassant => {
                let capsq = to.offset(-us.push());
                let occ = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(capsq))
                    | Bitboard::from_square(to);
                let rooks = self.pieces_cp(us, PieceType::Rook)
                    | self.pieces_cp(us, PieceType::Queen);
                let bishops = self.pieces_cp(us, PieceType::Bishop)
                    | self.pieces_cp(us, PieceType::Queen);
                !(attacks::rook_attacks(ksq, occ) & rooks).is_empty()
                    || !(attacks::bishop_attacks(ksq, occ) & bishops).is_empty()
            }
            MoveKind::Castling => {
                let kingside = to.index() > from.index();
                let rook_to = Square::make(if kingside { 5 } else { 3 }, from.rank());
                let king_to = Square::make(if kingside { 6 } else { 2 }, from.rank());
                let occ = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(to))
                    | Bitboard::from_square(king_to)
                    | Bitboard::from_square(rook_to);
                attacks::rook_attacks(rook_to, occ).contains(ksq)
            }
        }
    }
}

pub(crate) fn castle_right(color: Color, kingside: bool) -> u8 {
    match (color, kingside) {
        (Color::White, true) => super::WHITE_OO,
        (Color::White, false) => super::WHITE_OOO,
        (Color::Black, true) => super::BLACK_OO,
        (Color::Black, false) => super::BLACK_OOO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Piece;

    #[test]
    fn pinned_piece_cannot_leave_the_line() {
        // White bishop on d2 is pinned by the rook on d8.
        let pos =
            Position::from_fen("3r2k1/8/8/8/8/8/3B4/3K4 w - - 0 1", false).unwrap();
        let bishop = Square::make(3, 1);
        assert!(pos.blockers_for_king(Color::White).contains(bishop));
        let off_line = Move::new(bishop, Square::make(4, 2));
        assert!(pos.is_pseudolegal(off_line));
        assert!(!pos.is_legal(off_line));
    }

    #[test]
    fn en_passant_discovered_check_is_illegal() {
        // Both pawns vacate the fifth rank and the rook sees the king.
        let pos =
            Position::from_fen("8/8/8/KPpr4/8/8/8/4k3 w - c6 0 2", false).unwrap();
        let ep = Move::en_passant(Square::make(1, 4), Square::make(2, 5));
        assert!(pos.is_pseudolegal(ep));
        assert!(!pos.is_legal(ep));
    }

    #[test]
    fn gives_check_direct_and_discovered() {
        let direct = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", false).unwrap();
        let ra8 = Move::new(Square::A1, Square::A8);
        assert!(direct.gives_check(ra8));
        let ra2 = Move::new(Square::A1, Square::make(0, 1));
        assert!(!direct.gives_check(ra2));

        // Bishop on e4 shields the black king from the e1 rook; any
        // bishop move off the file discovers check.
        let pos =
            Position::from_fen("4k3/8/8/8/4B3/8/8/3KR3 w - - 0 1", false).unwrap();
        let bishop = Square::make(4, 3);
        assert!(pos.blockers_for_king(Color::Black).contains(bishop));
        let off_file = Move::new(bishop, Square::make(3, 4));
        assert!(pos.gives_check(off_file));
        let other_diagonal = Move::new(bishop, Square::make(5, 4));
        assert!(pos.gives_check(other_diagonal));
    }

    #[test]
    fn pseudolegal_rejects_foreign_and_malformed_moves() {
        let pos = Position::startpos();
        // Black piece while white to move.
        assert!(!pos.is_pseudolegal(Move::new(Square::make(4, 6), Square::make(4, 4))));
        // Empty source square.
        assert!(!pos.is_pseudolegal(Move::new(Square::make(4, 3), Square::make(4, 4))));
        // Knight geometry violation.
        assert!(!pos.is_pseudolegal(Move::new(Square::B1, Square::make(1, 2))));
        // Pawn push into an occupied square.
        let blocked =
            Position::from_fen("4k3/8/8/8/8/4p3/4P3/4K3 w - - 0 1", false).unwrap();
        assert!(!blocked.is_pseudolegal(Move::new(Square::make(4, 1), Square::make(4, 2))));
        assert!(!blocked.is_pseudolegal(Move::new(Square::make(4, 1), Square::make(4, 3))));
    }

    #[test]
    fn evasion_constraints_in_check() {
        // White king on e1 checked by a rook on e8; a knight can block on
        // e4 but a rook move elsewhere stays illegal.
        let pos =
            Position::from_fen("4r2k/8/8/8/8/8/8/R2NK3 w - - 0 1", false).unwrap();
        assert!(pos.in_check());
        let block = Move::new(Square::D1, Square::make(4, 2));
        assert!(pos.is_pseudolegal(block));
        let ignore = Move::new(Square::A1, Square::make(0, 3));
        assert!(!pos.is_pseudolegal(ignore));
    }

    #[test]
    fn attackers_to_counts_both_sides() {
        let pos = Position::startpos();
        let e4 = Square::make(4, 3);
        assert!(pos.attackers_to(e4).is_empty());
        let d3 = Square::make(3, 2);
        let att = pos.attackers_to(d3);
        assert!(att.contains(Square::make(2, 1)));
        assert!(att.contains(Square::make(4, 1)));
        assert_eq!(
            pos.piece_on(Square::make(2, 1)),
            Some(Piece::new(Color::White, PieceType::Pawn))
        );
    }
}
