//! Shared services handed to every tool
//!
//! Built once at startup and shared by the registry, the built-in tools and
//! the dispatcher. The parameter order cache and the known-command set are
//! the only state that outlives a request.

use std::sync::Arc;

use flowhub_core::HubStore;

use crate::compiler::{CompiledFlow, FlowCompiler, KnownCommands, ParameterOrderCache};
use crate::mapper::TokenMapper;
use crate::naming::FlowNaming;
use crate::scanner::FlowScanner;

pub struct Services {
    pub store: Arc<dyn HubStore>,
    pub compiler: FlowCompiler,
    pub mapper: TokenMapper,
    pub known: Arc<KnownCommands>,
    pub orders: Arc<ParameterOrderCache>,
}

impl Services {
    pub fn new(store: Arc<dyn HubStore>, naming: FlowNaming) -> Self {
        let orders = Arc::new(ParameterOrderCache::new());
        let known = Arc::new(KnownCommands::new());

        Self {
            compiler: FlowCompiler::new(FlowScanner::new(naming), orders.clone(), known.clone()),
            mapper: TokenMapper::new(store.clone(), orders.clone(), known.clone()),
            store,
            known,
            orders,
        }
    }

    pub fn naming(&self) -> &FlowNaming {
        self.compiler.scanner().naming()
    }

    /// Fresh discovery pass over the hub's flows
    pub async fn discover(&self) -> Vec<CompiledFlow> {
        self.compiler.discover(self.store.as_ref()).await
    }
}
