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

str_enum!(PolicyStatus {
    Draft => "draft",
    Review => "review",
    Published => "published",
    Archived => "archived",
});

str_enum!(Role {
    Admin => "admin",
    Publisher => "publisher",
    Employee => "employee",
});

impl Role {
    /// Roles allowed to edit policy content and settings.
    pub fn can_publish(&self) -> bool {
        matches!(self, Self::Admin | Self::Publisher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn policy_status_round_trips_through_str() {
        for status in [
            PolicyStatus::Draft,
            PolicyStatus::Review,
            PolicyStatus::Published,
            PolicyStatus::Archived,
        ] {
            assert_eq!(PolicyStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_invalid_enum() {
        let err = PolicyStatus::from_str("retired").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn only_admin_and_publisher_can_publish() {
        assert!(Role::Admin.can_publish());
        assert!(Role::Publisher.can_publish());
        assert!(!Role::Employee.can_publish());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PolicyStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }
}
