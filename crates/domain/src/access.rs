use std::collections::BTreeSet;
use std::str::FromStr;

use lakewarden_core::AppError;
use serde::{Deserialize, Serialize};

/// Access tokens understood by the policy authority.
///
/// Tokens are stored lowercase; catalog-aware engines expect them uppercased
/// on the wire, which is applied at the transport layer, never here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Read rows through queries.
    Select,
    /// Raw read access.
    Read,
    /// Raw write access.
    Write,
    /// Create databases, tables, or functions.
    Create,
    /// Drop objects.
    Drop,
    /// Alter object definitions.
    Alter,
    /// Update rows.
    Update,
    /// Manage indexes.
    Index,
    /// Lock tables.
    Lock,
    /// Refresh materializations.
    Refresh,
    /// Every privilege the service knows.
    All,
    /// List objects; granted implicitly alongside `Select` on catalog-aware
    /// engines.
    Show,
    /// List views.
    ShowView,
    /// Bulk-load data.
    Load,
    /// Combined alter and create privilege.
    AlterCreate,
    /// Combined alter, create, and drop privilege.
    AlterCreateDrop,
    /// Read-write storage access.
    RwStorage,
    /// Register temporary functions.
    TempUdfAdmin,
    /// Administer the service definition.
    ServiceAdmin,
    /// Administer replication.
    ReplAdmin,
}

impl AccessKind {
    /// Returns the stable lowercase storage token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Alter => "alter",
            Self::Update => "update",
            Self::Index => "index",
            Self::Lock => "lock",
            Self::Refresh => "refresh",
            Self::All => "all",
            Self::Show => "show",
            Self::ShowView => "show_view",
            Self::Load => "load",
            Self::AlterCreate => "alter_create",
            Self::AlterCreateDrop => "alter_create_drop",
            Self::RwStorage => "rwstorage",
            Self::TempUdfAdmin => "tempudfadmin",
            Self::ServiceAdmin => "serviceadmin",
            Self::ReplAdmin => "repladmin",
        }
    }

    /// Returns whether administrators may request this token directly.
    ///
    /// The remaining tokens only appear through engine alias expansion.
    #[must_use]
    pub fn grantable(&self) -> bool {
        !matches!(
            self,
            Self::Show | Self::ShowView | Self::Load | Self::AlterCreate | Self::AlterCreateDrop
        )
    }

    /// The full privilege list a catalog-aware engine substitutes for `all`.
    #[must_use]
    pub fn engine_full_privileges() -> BTreeSet<Self> {
        BTreeSet::from([
            Self::ShowView,
            Self::Show,
            Self::Load,
            Self::Alter,
            Self::Create,
            Self::AlterCreate,
            Self::Select,
            Self::Drop,
            Self::AlterCreateDrop,
        ])
    }
}

impl FromStr for AccessKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "select" => Ok(Self::Select),
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "create" => Ok(Self::Create),
            "drop" => Ok(Self::Drop),
            "alter" => Ok(Self::Alter),
            "update" => Ok(Self::Update),
            "index" => Ok(Self::Index),
            "lock" => Ok(Self::Lock),
            "refresh" => Ok(Self::Refresh),
            "all" => Ok(Self::All),
            "show" => Ok(Self::Show),
            "show_view" => Ok(Self::ShowView),
            "load" => Ok(Self::Load),
            "alter_create" => Ok(Self::AlterCreate),
            "alter_create_drop" => Ok(Self::AlterCreateDrop),
            "rwstorage" => Ok(Self::RwStorage),
            "tempudfadmin" => Ok(Self::TempUdfAdmin),
            "serviceadmin" => Ok(Self::ServiceAdmin),
            "repladmin" => Ok(Self::ReplAdmin),
            _ => Err(AppError::Validation(format!(
                "unknown access token '{value}'"
            ))),
        }
    }
}
