use std::sync::Arc;

use crate::auth::JwtMaker;
use crate::ledger::LedgerService;
use crate::store::Store;
use crate::users::UserService;

/// Gateway application state (shared across handlers)
pub struct AppState<S> {
    pub ledger: LedgerService<S>,
    pub users: UserService<S>,
    pub token_maker: Arc<JwtMaker>,
}

impl<S: Store> AppState<S> {
    pub fn new(ledger: LedgerService<S>, users: UserService<S>, token_maker: Arc<JwtMaker>) -> Self {
        Self {
            ledger,
            users,
            token_maker,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.ledger.store()
    }
}
