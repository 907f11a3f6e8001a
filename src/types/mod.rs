//! Core protocol types.
//!
//! Fundamental types shared by the parser, the command encoder, and the
//! connection state machine.

mod sequence;
mod status;

pub use sequence::{Bound, SeqSet};
pub use status::{IdMode, Status};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_round_trip() {
        assert_eq!(Status::parse(b"OK"), Some(Status::Ok));
        assert_eq!(Status::parse(b"no"), Some(Status::No));
        assert_eq!(Status::parse(b"Bad"), Some(Status::Bad));
        assert_eq!(Status::parse(b"BYE"), Some(Status::Bye));
        assert_eq!(Status::parse(b"PREAUTH"), Some(Status::PreAuth));
        assert_eq!(Status::parse(b"MAYBE"), None);
    }

    #[test]
    fn seq_set_forms() {
        assert_eq!(SeqSet::single(7).to_string(), "7");
        assert_eq!(SeqSet::range(3, Bound::Num(9)).to_string(), "3:9");
        assert_eq!(SeqSet::range(3, Bound::Star).to_string(), "3:*");
        assert_eq!(SeqSet::list(&[1, 4, 9]).to_string(), "1,4,9");
    }

    #[test]
    fn id_mode_prefix() {
        assert_eq!(IdMode::Uid.prefix(), "UID ");
        assert_eq!(IdMode::Msgn.prefix(), "");
    }
}
