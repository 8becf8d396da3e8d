//! flagshift catalog
//!
//! Shared vocabulary of the migrator:
//!
//! - **Model**: [`Finding`] and the data it carries
//! - **Catalog**: every recognized Statsig call shape and its LaunchDarkly target
//! - **Naming**: [`NamingPolicy`] mapping source names to target names
//! - **Literals**: [`JsValue`] lifted from call-site arguments
//!
//! # Example
//!
//! ```rust,ignore
//! use flagshift_catalog::{Catalog, NamingPolicy, SdkVariant};
//!
//! let catalog = Catalog::new()?;
//! assert!(catalog.method("checkGate").is_some());
//! assert_eq!(
//!     NamingPolicy::new().target_name("admin_panel_access", SdkVariant::React),
//!     "adminPanelAccess"
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod catalog;
pub mod error;
pub mod literal;
pub mod model;
pub mod naming;

pub use catalog::{
    Catalog, ConstructMatch, HookMatch, HookSpec, ImportBinding, ImportMatch, JsxMatch, MatchShape,
    MethodMatch, MethodRole, MethodSpec, ObservabilityTarget, PatternMatch, PluginMatch, Pragma,
    TargetApi, DEFAULT_PRAGMA_TAG, PROVIDER_PROPS,
};
pub use error::CatalogError;
pub use literal::JsValue;
pub use model::{
    CallDetail, CallStyle, Confidence, EventArgs, Finding, FindingDetail, FindingId, FindingKind,
    HookShape, ImportDetail, Location, NameArg, PackageRole, ParamRead, PluginKind, ProviderDetail,
    ProviderStyle, SdkVariant,
};
pub use naming::NamingPolicy;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with findings
    pub use crate::catalog::{Catalog, MatchShape, PatternMatch};
    pub use crate::error::CatalogError;
    pub use crate::literal::JsValue;
    pub use crate::model::{
        Confidence, Finding, FindingDetail, FindingId, FindingKind, Location, SdkVariant,
    };
    pub use crate::naming::NamingPolicy;
}
