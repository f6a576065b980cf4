use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocumentType {
    NationalId => "national_id",
    TaxId => "tax_id",
    DrivingPermit => "driving_permit",
    Passport => "passport",
    VoterId => "voter_id",
});

str_enum!(DocumentStatus {
    Pending => "pending",
    Verified => "verified",
    Invalid => "invalid",
    Error => "error",
});

str_enum!(FailureKind {
    Validation => "validation",
    Extraction => "extraction",
    Storage => "storage",
    Anchoring => "anchoring",
    Timeout => "timeout",
    Internal => "internal",
});

impl DocumentType {
    /// Every supported document type, in declaration order.
    pub const ALL: [DocumentType; 5] = [
        DocumentType::NationalId,
        DocumentType::TaxId,
        DocumentType::DrivingPermit,
        DocumentType::Passport,
        DocumentType::VoterId,
    ];

    /// Human-readable label used in validation messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NationalId => "national-id",
            Self::TaxId => "tax-id",
            Self::DrivingPermit => "driving-permit",
            Self::Passport => "passport",
            Self::VoterId => "voter-id",
        }
    }

    /// Lenient parse for inbound requests: accepts `national_id`,
    /// `national-id` and `NATIONAL_ID`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        normalized.parse().ok()
    }
}

impl DocumentStatus {
    /// Terminal states only leave via an explicit retry.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Invalid and Error both count as "failed" in owner statistics.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Invalid | Self::Error)
    }
}
