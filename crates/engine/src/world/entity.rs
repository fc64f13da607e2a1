use slotmap::new_key_type;

new_key_type! {
    /// Handle to an entity owned by the host's entity storage.
    ///
    /// Chunks only bucket these; moving an entity between buckets when its
    /// position changes is the caller's job.
    pub struct EntityKey;
}
