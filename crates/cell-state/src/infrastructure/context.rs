//! Request contexts for directory reads issued by the manager itself.

use uuid::Uuid;

use crate::cells::traits::AdminContextProvider;
use crate::cells::QueryContext;

/// Issues a fresh privileged context, tagged with a random request id, for
/// every synchronization pass
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminContextFactory;

impl AdminContextProvider for AdminContextFactory {
    fn admin_context(&self) -> QueryContext {
        QueryContext::admin(format!("req-{}", Uuid::new_v4()))
    }
}
