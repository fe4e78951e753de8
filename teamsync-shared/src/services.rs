/// Core service wiring
///
/// [`CoreServices`] builds every service over one store and one presence
/// registry. The API and the tests construct exactly one of these.
///
/// # Example
///
/// ```
/// use teamsync_shared::config::CoreConfig;
/// use teamsync_shared::services::CoreServices;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let core = CoreServices::in_memory(CoreConfig::default());
/// let ada = core.accounts.register("Ada", "ada@example.com").await?;
/// assert!(core.inbox.list(ada.id).await?.is_empty());
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use crate::accounts::Accounts;
use crate::config::CoreConfig;
use crate::notifications::{Inbox, NotificationFanout};
use crate::presence::{Broadcaster, Presence, Rooms};
use crate::store::{InMemoryStore, Store};
use crate::tasks::TaskService;
use crate::teams::TeamService;

/// Every core service, sharing one store
#[derive(Clone)]
pub struct CoreServices {
    pub accounts: Accounts,
    pub teams: TeamService,
    pub tasks: TaskService,
    pub inbox: Inbox,
    pub fanout: NotificationFanout,
    pub presence: Arc<Presence>,
    pub store: Arc<dyn Store>,
    pub config: CoreConfig,
}

impl CoreServices {
    pub fn new(store: Arc<dyn Store>, broadcaster: Arc<dyn Broadcaster>, config: CoreConfig) -> Self {
        let presence = Arc::new(Presence::new(
            store.clone(),
            broadcaster,
            config.max_attempts,
        ));
        let fanout = NotificationFanout::new(store.clone(), presence.clone(), config.max_attempts);

        Self {
            accounts: Accounts::new(store.clone(), fanout.clone(), config.clone()),
            teams: TeamService::new(store.clone(), fanout.clone(), config.clone()),
            tasks: TaskService::new(store.clone(), fanout.clone(), config.clone()),
            inbox: Inbox::new(store.clone(), config.clone()),
            fanout,
            presence,
            store,
            config,
        }
    }

    /// Services over a fresh [`InMemoryStore`] with in-process rooms
    pub fn in_memory(config: CoreConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(Rooms::new()),
            config,
        )
    }
}
