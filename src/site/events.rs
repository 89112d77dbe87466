use super::ContentId;

/// Content lifecycle notification delivered to the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    /// A page version was published at `path`
    Published { path: String },

    /// A page and its subtree moved from `old_path` to `new_path`
    Moved { old_path: String, new_path: String },

    /// A page and its subtree were deleted
    Deleted { path: String },

    /// A non-page content item (a shared block, a media asset) changed
    ContentChanged { id: ContentId },
}
