//! Stack and change-set status vocabulary.
//!
//! CloudFormation exchanges statuses as strings. They are parsed once into
//! these enums so the lifecycle checks (`is_terminal`, `requires_replacement`,
//! ...) live in one place instead of being re-derived from string suffixes at
//! every call site. Values CloudFormation adds later land in `Unknown` and are
//! still classified by suffix.

use std::fmt;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// A status this version does not know by name.
            Unknown(String),
        }

        impl $name {
            /// The provider's spelling of this status.
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Unknown(text) => text.as_str(),
                }
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                match text {
                    $($text => $name::$variant,)+
                    other => $name::Unknown(other.to_string()),
                }
            }
        }

        impl From<String> for $name {
            fn from(text: String) -> Self {
                $name::from(text.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum! {
    /// Status of a stack as reported by `DescribeStacks`.
    StackStatus {
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateFailed => "CREATE_FAILED",
        CreateComplete => "CREATE_COMPLETE",
        RollbackInProgress => "ROLLBACK_IN_PROGRESS",
        RollbackFailed => "ROLLBACK_FAILED",
        RollbackComplete => "ROLLBACK_COMPLETE",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteFailed => "DELETE_FAILED",
        DeleteComplete => "DELETE_COMPLETE",
        UpdateInProgress => "UPDATE_IN_PROGRESS",
        UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
        UpdateComplete => "UPDATE_COMPLETE",
        UpdateFailed => "UPDATE_FAILED",
        UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
        UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
        UpdateRollbackCompleteCleanupInProgress => "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS",
        UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
        ReviewInProgress => "REVIEW_IN_PROGRESS",
        ImportInProgress => "IMPORT_IN_PROGRESS",
        ImportComplete => "IMPORT_COMPLETE",
        ImportRollbackInProgress => "IMPORT_ROLLBACK_IN_PROGRESS",
        ImportRollbackFailed => "IMPORT_ROLLBACK_FAILED",
        ImportRollbackComplete => "IMPORT_ROLLBACK_COMPLETE",
    }
}

status_enum! {
    /// Status of a change-set as reported by `DescribeChangeSet`.
    ChangeSetStatus {
        CreatePending => "CREATE_PENDING",
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateComplete => "CREATE_COMPLETE",
        DeletePending => "DELETE_PENDING",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteComplete => "DELETE_COMPLETE",
        DeleteFailed => "DELETE_FAILED",
        Failed => "FAILED",
    }
}

impl StackStatus {
    /// No further transition happens without caller action.
    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }

    pub fn is_complete(&self) -> bool {
        self.as_str().ends_with("_COMPLETE")
    }

    pub fn is_failed(&self) -> bool {
        self.as_str().ends_with("_FAILED")
    }

    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Stacks in these states cannot be updated in place and must be
    /// deleted before they can be deployed again.
    pub fn requires_replacement(&self) -> bool {
        matches!(self, StackStatus::CreateFailed | StackStatus::RollbackComplete)
    }
}

impl ChangeSetStatus {
    pub fn is_complete(&self) -> bool {
        self.as_str().ends_with("COMPLETE")
    }

    pub fn is_failed(&self) -> bool {
        self.as_str().ends_with("FAILED")
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }
}
