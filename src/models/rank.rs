use serde::{Deserialize, Serialize};

/// Driver tier. Older records carry the Page/Squire/Knight/Lord names for the
/// same ladder, so those are accepted on input and never written back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    #[serde(alias = "Page", alias = "page", alias = "recruit")]
    Recruit,
    #[serde(alias = "Squire", alias = "squire", alias = "sergeant")]
    Sergeant,
    #[serde(alias = "Knight", alias = "knight", alias = "captain")]
    Captain,
    #[serde(alias = "Lord", alias = "lord", alias = "general")]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub next: Rank,
    pub required_completed: u32,
    pub max_failed_in_last_100: u32,
}

impl Rank {
    pub fn allowed_batch_sizes(self) -> &'static [u32] {
        match self {
            Rank::Recruit => &[25],
            Rank::Sergeant => &[25, 50],
            Rank::Captain => &[25, 50, 100, 200],
            Rank::General => &[25, 50, 100, 200, 500],
        }
    }

    pub fn max_batch(self) -> u32 {
        self.allowed_batch_sizes()
            .iter()
            .copied()
            .max()
            .unwrap_or_default()
    }

    /// The single next step up the ladder, if any.
    pub fn promotion(self) -> Option<Promotion> {
        match self {
            Rank::Recruit => Some(Promotion {
                next: Rank::Sergeant,
                required_completed: 100,
                max_failed_in_last_100: 10,
            }),
            Rank::Sergeant => Some(Promotion {
                next: Rank::Captain,
                required_completed: 500,
                max_failed_in_last_100: 5,
            }),
            Rank::Captain => Some(Promotion {
                next: Rank::General,
                required_completed: 2000,
                max_failed_in_last_100: 2,
            }),
            Rank::General => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Recruit => "Recruit",
            Rank::Sergeant => "Sergeant",
            Rank::Captain => "Captain",
            Rank::General => "General",
        }
    }
}
