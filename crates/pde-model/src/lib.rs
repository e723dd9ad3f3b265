//! Plug-in and feature models: the bundle universe, the feature index and the code that keeps
//! them in sync with the workspace and the target platform.

pub mod delta;
mod event;
pub mod feature;
mod feature_index;
pub mod loader;
mod plugin;
mod universe;
mod workspace;

pub use delta::{ChangeCategory, DeltaProcessor, DeltaSummary, FileChange, FileChangeKind};
pub use event::{ModelChangeEvent, ModelListener, SubscriptionId};
pub use feature::{FeatureDescriptor, FeatureError, FeatureOrigin};
pub use feature_index::{FeatureChangeEvent, FeatureIndex};
pub use loader::ScanResult;
pub use plugin::{
    BundleKind, BundleOrigin, DescriptorHandle, HostRef, Import, Library, PluginDescriptor,
};
pub use universe::{BatchGuard, BundleUniverse};
pub use workspace::{FsWorkspace, Workspace};
