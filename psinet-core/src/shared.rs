//! Thread-shared handle to a net, for hosts that step on one thread and
//! inspect from others.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::NetResult;
use crate::nodenet::Nodenet;

/// Cloneable handle; every clone sees the same net
#[derive(Clone)]
pub struct SharedNodenet {
    inner: Arc<RwLock<Nodenet>>,
}

impl SharedNodenet {
    pub fn new(net: Nodenet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(net)),
        }
    }

    /// Step under the write lock. Readers never see a half-finished step.
    pub fn step(&self) -> NetResult<u64> {
        self.inner.write().step()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Nodenet) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Nodenet) -> R) -> R {
        f(&mut self.inner.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::REGISTER;
    use std::thread;

    #[test]
    fn test_step_from_another_thread() {
        let shared = SharedNodenet::new(Nodenet::new("shared"));
        let reg = shared
            .write(|net| {
                let root = net.root();
                let reg = net.create_node(REGISTER, root, None)?;
                net.create_link(reg, "gen", reg, "gen", 1.0)?;
                net.set_gate_activation(reg, "gen", 1.0)?;
                Ok::<_, crate::error::NetError>(reg)
            })
            .unwrap();

        let worker = shared.clone();
        thread::spawn(move || {
            for _ in 0..5 {
                worker.step().unwrap();
            }
        })
        .join()
        .unwrap();

        shared.read(|net| {
            assert_eq!(net.current_step(), 5);
            assert_eq!(net.gate(reg, "gen").unwrap().activation, 1.0);
        });
    }
}
