//! FEN parsing and formatting, including Shredder/X-FEN castling fields
//! for Chess960.

use std::fmt;

use super::{Position, BLACK_OO, BLACK_OOO, WHITE_OO, WHITE_OOO};
use crate::position::attacks;
use crate::types::{Color, Piece, PieceType, Square};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    MissingField(&'static str),
    BadPlacement(String),
    BadSideToMove(String),
    BadCastling(String),
    BadEnPassant(String),
    MissingKing(Color),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingField(field) => write!(f, "FEN is missing the {field} field"),
            FenError::BadPlacement(s) => write!(f, "invalid piece placement: {s}"),
            FenError::BadSideToMove(s) => write!(f, "invalid side to move: {s}"),
            FenError::BadCastling(s) => write!(f, "invalid castling field: {s}"),
            FenError::BadEnPassant(s) => write!(f, "invalid en-passant square: {s}"),
            FenError::MissingKing(c) => write!(f, "{c:?} has no king"),
        }
    }
}

impl std::error::Error for FenError {}

impl Position {
    /// Parse a FEN string. `chess960` selects Chess960 castling semantics;
    /// Shredder (file letter) and X-FEN (outermost rook) castling tokens
    /// are accepted either way.
    pub fn from_fen(fen: &str, chess960: bool) -> Result<Position, FenError> {
        let mut parts = fen.split_whitespace();
        let placement = parts.next().ok_or(FenError::MissingField("placement"))?;
        let side = parts.next().ok_or(FenError::MissingField("side to move"))?;
        let castling = parts.next().unwrap_or("-");
        let ep = parts.next().unwrap_or("-");
        let halfmove = parts.next().unwrap_or("0");
        let fullmove = parts.next().unwrap_or("1");

        let mut pos = Position::empty();
        pos.chess960 = chess960;

        let mut rank = 7i8;
        let mut file = 0i8;
        for c in placement.chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                    if rank < 0 {
                        return Err(FenError::BadPlacement(placement.to_string()));
                    }
                }
                '1'..='8' => file += c as i8 - b'0' as i8,
                _ => {
                    let pc = Piece::from_char(c)
                        .ok_or_else(|| FenError::BadPlacement(placement.to_string()))?;
                    if file > 7 {
                        return Err(FenError::BadPlacement(placement.to_string()));
                    }
                    pos.put_piece(pc, Square::make(file as u8, rank as u8));
                    file += 1;
                }
            }
            if file > 8 {
                return Err(FenError::BadPlacement(placement.to_string()));
            }
        }

        pos.side = match side {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadSideToMove(other.to_string())),
        };

        for color in Color::ALL {
            if pos.pieces_cp(color, PieceType::King).count() != 1 {
                return Err(FenError::MissingKing(color));
            }
        }

        if castling != "-" {
            for c in castling.chars() {
                let color = if c.is_ascii_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let king = pos.king_square(color);
                let rooks = pos.pieces_cp(color, PieceType::Rook)
                    & crate::types::Bitboard::rank_bb(king.rank());
                let rook = match c.to_ascii_uppercase() {
                    // X-FEN: outermost rook on the given side of the king.
                    'K' => rooks.filter(|r| r.index() > king.index()).last(),
                    'Q' => rooks.filter(|r| r.index() < king.index()).next(),
                    // Shredder: explicit rook file.
                    'A'..='H' => {
                        let f = c.to_ascii_uppercase() as u8 - b'A';
                        let sq = Square::make(f, king.rank());
                        rooks.filter(|&r| r == sq).next()
                    }
                    _ => return Err(FenError::BadCastling(castling.to_string())),
                };
                let rook = rook.ok_or_else(|| FenError::BadCastling(castling.to_string()))?;
                pos.set_castling_right(color, rook);
            }
        }

        if ep != "-" {
            let sq: Square = ep
                .parse()
                .map_err(|()| FenError::BadEnPassant(ep.to_string()))?;
            // Keep the square only when a pawn is actually poised to use it.
            let us = pos.side;
            let them = !us;
            let pusher_ok = pos
                .pieces_cp(them, PieceType::Pawn)
                .contains(sq.offset(them.push()));
            let capturer_ok = !(attacks::pawn_attacks(them, sq)
                & pos.pieces_cp(us, PieceType::Pawn))
            .is_empty();
            if pusher_ok && capturer_ok {
                pos.state_mut().ep_square = Some(sq);
            }
        }

        pos.state_mut().rule50 = halfmove.parse().unwrap_or(0);
        let fullmove: u16 = fullmove.parse().unwrap_or(1);
        pos.game_ply =
            (fullmove.max(1) - 1) * 2 + if pos.side == Color::Black { 1 } else { 0 };

        pos.compute_non_pawn_material();
        let key = pos.compute_key();
        pos.state_mut().key = key;
        pos.update_state();
        Ok(pos)
    }

    /// Format the current position as a FEN string; inverse of
    /// [`Position::from_fen`].
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_on(Square::make(file, rank)) {
                    Some(pc) => {
                        if empty > 0 {
                            fen.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        fen.push(pc.to_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push((b'0' + empty) as char);
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side == Color::White { 'w' } else { 'b' });

        fen.push(' ');
        let rights = self.castling_rights();
        if rights == 0 {
            fen.push('-');
        } else {
            for (right, standard) in [
                (WHITE_OO, 'K'),
                (WHITE_OOO, 'Q'),
                (BLACK_OO, 'k'),
                (BLACK_OOO, 'q'),
            ] {
                if rights & right != 0 {
                    if self.chess960 {
                        let rook = self.castling_rook[right as usize]
                            .expect("right implies a rook square");
                        let c = (b'a' + rook.file()) as char;
                        fen.push(if standard.is_ascii_uppercase() {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        });
                    } else {
                        fen.push(standard);
                    }
                }
            }
        }

        fen.push(' ');
        match self.ep_square() {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(
            " {} {}",
            self.rule50(),
            self.game_ply / 2 + 1
        ));
        fen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_roundtrip() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let pos = Position::from_fen(fen, false).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn kiwipete_roundtrip() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let pos = Position::from_fen(fen, false).unwrap();
        assert_eq!(pos.to_fen(), fen);
        assert_eq!(pos.key(), pos.compute_key());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Position::from_fen("", false).is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1", false).is_err());
        assert!(Position::from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1", false).is_err());
        assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1", false).is_err());
    }

    #[test]
    fn shredder_castling_tokens() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w HAha - 0 1";
        let pos = Position::from_fen(fen, true).unwrap();
        assert_eq!(pos.castling_rights(), 0b1111);
        assert_eq!(pos.castling_rook(WHITE_OO), Some(Square::H1));
        assert_eq!(pos.castling_rook(WHITE_OOO), Some(Square::A1));
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn chess960_inner_rook() {
        // King on b1, rooks on a1 and c1: castling both ways is encoded by
        // rook file, not by K/Q.
        let fen = "1k6/8/8/8/8/8/8/RKR5 w CA - 0 1";
        let pos = Position::from_fen(fen, true).unwrap();
        assert_eq!(pos.castling_rook(WHITE_OO), Some(Square::C1));
        assert_eq!(pos.castling_rook(WHITE_OOO), Some(Square::A1));
    }

    #[test]
    fn ep_square_dropped_when_unusable() {
        // e3 given but no black pawn can capture there.
        let fen = "4k3/8/8/8/4P3/8/8/4K3 b - e3 0 1";
        let pos = Position::from_fen(fen, false).unwrap();
        assert_eq!(pos.ep_square(), None);
    }

    #[test]
    fn fullmove_to_game_ply() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 b - - 3 10", false).unwrap();
        assert_eq!(pos.game_ply(), 19);
        assert_eq!(pos.rule50(), 3);
        assert!(pos.to_fen().ends_with("3 10"));
    }
}
