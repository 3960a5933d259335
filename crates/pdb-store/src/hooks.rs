/// Observer of mutations applied to a [`Store`](crate::Store).
///
/// Hooks run synchronously on the mutating thread, after the mutation has been
/// applied and after the store has released its internal lock. A hook may
/// therefore write to any other store, but must not mutate the store that
/// invoked it.
///
/// Keys are the physical `<pid>/<field>` keys; values are passed unchanged.
pub trait MutationHooks: Send + Sync {
    /// Called after `put(key, value)`.
    fn on_put(&self, key: &[u8], value: &[u8]);

    /// Called after `append(key, value)`; `value` is the appended suffix.
    fn on_append(&self, key: &[u8], value: &[u8]);

    /// Called after `remove_at(key)`.
    fn on_delete(&self, key: &[u8]);
}
