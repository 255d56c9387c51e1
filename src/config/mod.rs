//! Tree configuration
//!
//! Per-tree-type column map, resolved once at construction:
//! - left/right index columns
//! - optional partition column (multi-tree tables) and the selected tree
//! - display and symlink columns
//! - retry bound for tree id allocation

use std::thread;
use std::time::Duration;

use crate::TreeError;

/// Tree partition key
pub type TreeId = i64;

/// Default column holding the left index
pub const DEFAULT_LEFT_FIELD: &str = "left_id";

/// Default column holding the right index
pub const DEFAULT_RIGHT_FIELD: &str = "right_id";

/// Default column holding the symlink target
pub const DEFAULT_SYMLINK_FIELD: &str = "symlink_id";

/// Default number of save attempts when allocating a tree id
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Columns the tree reads, filters and renumbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Column {
    /// Left index
    Left,
    /// Right index
    Right,
    /// Partition key
    Tree,
}

/// Bound and pacing for optimistic tree id allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    /// Total save attempts, the first one included
    pub max_attempts: u32,

    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Policy with explicit bound and pause
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, conflicts surface immediately
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Effective number of attempts (never below one)
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Sleep for the configured backoff, if any
    pub(crate) fn pause(&self) {
        if !self.backoff.is_zero() {
            thread::sleep(self.backoff);
        }
    }
}

/// Column map for one tree type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TreeConfig {
    /// Column holding the left index
    pub left_field: String,

    /// Column holding the right index
    pub right_field: String,

    /// Column holding the partition key (`None` = one tree per table)
    pub tree_field: Option<String>,

    /// Selected partition
    pub tree_value: Option<TreeId>,

    /// Display column, unused by the interval algebra
    pub title_field: Option<String>,

    /// Column holding the symlink target
    pub symlink_field: String,

    /// Track the symlink relation
    pub use_symlinks: bool,

    /// Tree id allocation policy (multi-tree mode only)
    pub retry: RetryPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            left_field: DEFAULT_LEFT_FIELD.to_string(),
            right_field: DEFAULT_RIGHT_FIELD.to_string(),
            tree_field: None,
            tree_value: None,
            title_field: None,
            symlink_field: DEFAULT_SYMLINK_FIELD.to_string(),
            use_symlinks: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl TreeConfig {
    /// Create fluent builder
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::new()
    }

    /// Default column names, partitioned by `tree_field`
    pub fn multi_tree(tree_field: impl Into<String>) -> Self {
        Self {
            tree_field: Some(tree_field.into()),
            ..Self::default()
        }
    }

    /// Several trees share the table
    pub fn is_multi_tree(&self) -> bool {
        self.tree_field.is_some()
    }

    /// Resolve a typed column to its configured name
    ///
    /// `Column::Tree` has no name in single-tree mode.
    pub fn column_name(&self, column: Column) -> Option<&str> {
        match column {
            Column::Left => Some(&self.left_field),
            Column::Right => Some(&self.right_field),
            Column::Tree => self.tree_field.as_deref(),
        }
    }

    /// Columns owned by the tree; callers must not assign them directly
    pub fn readonly_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.left_field.as_str(), self.right_field.as_str()];
        if let Some(tree_field) = self.tree_field.as_deref() {
            fields.push(tree_field);
        }
        if self.use_symlinks {
            fields.push(self.symlink_field.as_str());
        }
        fields
    }

    /// Check column names and partition settings
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut named = vec![
            ("left_field", self.left_field.as_str()),
            ("right_field", self.right_field.as_str()),
        ];
        if let Some(tree_field) = self.tree_field.as_deref() {
            named.push(("tree_field", tree_field));
        }
        if self.use_symlinks {
            named.push(("symlink_field", self.symlink_field.as_str()));
        }

        for (option, name) in &named {
            if name.trim().is_empty() {
                return Err(TreeError::InvalidConfiguration(format!(
                    "{option} must not be empty"
                )));
            }
        }
        for (i, (option, name)) in named.iter().enumerate() {
            if let Some((other, _)) = named[i + 1..].iter().find(|(_, n)| n == name) {
                return Err(TreeError::InvalidConfiguration(format!(
                    "{option} and {other} both use column '{name}'"
                )));
            }
        }

        match (self.tree_field.as_ref(), self.tree_value) {
            (None, Some(value)) => Err(TreeError::InvalidConfiguration(format!(
                "tree_value {value} given without a tree_field"
            ))),
            (Some(_), Some(value)) if value <= 0 => Err(TreeError::InvalidConfiguration(
                format!("tree_value must be positive, got {value}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Builder for tree configurations (fluent API)
#[derive(Debug, Default)]
pub struct TreeConfigBuilder {
    left_field: Option<String>,
    right_field: Option<String>,
    tree_field: Option<String>,
    tree_value: Option<TreeId>,
    title_field: Option<String>,
    symlink_field: Option<String>,
    use_symlinks: bool,
    retry: Option<RetryPolicy>,
}

impl TreeConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set left index column
    pub fn left_field(mut self, name: impl Into<String>) -> Self {
        self.left_field = Some(name.into());
        self
    }

    /// Set right index column
    pub fn right_field(mut self, name: impl Into<String>) -> Self {
        self.right_field = Some(name.into());
        self
    }

    /// Enable multi-tree mode on this partition column
    pub fn tree_field(mut self, name: impl Into<String>) -> Self {
        self.tree_field = Some(name.into());
        self
    }

    /// Select the active tree
    pub fn tree_value(mut self, value: TreeId) -> Self {
        self.tree_value = Some(value);
        self
    }

    /// Set display column
    pub fn title_field(mut self, name: impl Into<String>) -> Self {
        self.title_field = Some(name.into());
        self
    }

    /// Set symlink column
    pub fn symlink_field(mut self, name: impl Into<String>) -> Self {
        self.symlink_field = Some(name.into());
        self
    }

    /// Track the symlink relation
    pub fn use_symlinks(mut self, enabled: bool) -> Self {
        self.use_symlinks = enabled;
        self
    }

    /// Set tree id retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<TreeConfig, TreeError> {
        let defaults = TreeConfig::default();
        let config = TreeConfig {
            left_field: self.left_field.unwrap_or(defaults.left_field),
            right_field: self.right_field.unwrap_or(defaults.right_field),
            tree_field: self.tree_field,
            tree_value: self.tree_value,
            title_field: self.title_field,
            symlink_field: self.symlink_field.unwrap_or(defaults.symlink_field),
            use_symlinks: self.use_symlinks,
            retry: self.retry.unwrap_or(defaults.retry),
        };
        config.validate()?;
        Ok(config)
    }
}
