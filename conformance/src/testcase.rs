//! Test case metadata.

use std::fmt;
use std::sync::Arc;

use pdureplay_core::Script;

use crate::peer::PeerFactory;

/// A registered test: a unique name, the script the engine replays, and the
/// factory that builds the peer under test.
///
/// Cloning shares the script and factory; nothing is copied per run.
#[derive(Clone)]
pub struct TestCase {
    name: Arc<str>,
    script: Script,
    factory: Arc<dyn PeerFactory>,
}

impl TestCase {
    pub fn new(name: impl Into<Arc<str>>, script: Script, factory: Arc<dyn PeerFactory>) -> Self {
        Self {
            name: name.into(),
            script,
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn factory(&self) -> &dyn PeerFactory {
        self.factory.as_ref()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("steps", &self.script.len())
            .finish_non_exhaustive()
    }
}
