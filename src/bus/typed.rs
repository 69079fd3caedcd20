//! Typed payloads for type-safe message handling
//!
//! The bus itself only moves bytes. These helpers let producers publish any
//! `Serialize` value and consumers read it back as a concrete type, so a
//! worker does not have to hand-roll its own framing. JSON is the wire form.

use crate::bus::element::{Element, Outgoing, QueueState};
use crate::bus::error::{BusError, BusResult};
use crate::bus::queue::Queue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

impl Outgoing<'static> {
    /// Serialize `value` into a copy-on-publish payload
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> BusResult<Self> {
        serde_json::to_vec(value)
            .map(Outgoing::from_vec)
            .map_err(|e| BusError::Codec {
                message: format!("Failed to encode payload: {}", e),
            })
    }
}

impl Element {
    /// Deserialize the payload as `T`
    pub fn decode<T: DeserializeOwned>(&self) -> BusResult<T> {
        serde_json::from_slice(self.payload()).map_err(|e| BusError::Codec {
            message: format!("Failed to decode {} byte payload: {}", self.len(), e),
        })
    }
}

/// A decoded message together with the queue state observed when it was popped
#[derive(Debug, Clone, PartialEq)]
pub struct TypedElement<T> {
    pub content: T,
    pub queue_state: QueueState,
}

impl<T> TypedElement<T> {
    pub fn had_overrun(&self) -> bool {
        self.queue_state == QueueState::Overrun
    }
}

/// A queue reader that decodes every element to `T`
///
/// # Example
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
/// use telebus::bus::{Outgoing, Queue, QueueOptions, TypedConsumer};
///
/// #[derive(Serialize, Deserialize)]
/// struct Reading {
///     volts: u32,
/// }
///
/// let queue = Arc::new(Queue::new("charger", 4, QueueOptions::default()).unwrap());
/// queue.push(Outgoing::encode(&Reading { volts: 52 }).unwrap()).unwrap();
///
/// let reader: TypedConsumer<Reading> = TypedConsumer::new(queue);
/// let reading = reader.read().unwrap().unwrap();
/// assert_eq!(reading.content.volts, 52);
/// ```
pub struct TypedConsumer<T> {
    queue: Arc<Queue>,
    _phantom: PhantomData<T>,
}

impl<T> TypedConsumer<T>
where
    T: DeserializeOwned,
{
    pub fn new(queue: Arc<Queue>) -> Self {
        Self {
            queue,
            _phantom: PhantomData,
        }
    }

    /// Pop and decode the next element.
    ///
    /// Returns:
    /// - `Ok(Some(..))` - an element was popped and decoded
    /// - `Ok(None)` - the queue is empty
    /// - `Err(BusError)` - lock failure or an undecodable payload (which is consumed)
    pub fn read(&self) -> BusResult<Option<TypedElement<T>>> {
        match self.queue.pop()? {
            Some(element) => Ok(Some(TypedElement {
                content: element.decode()?,
                queue_state: element.queue_state(),
            })),
            None => Ok(None),
        }
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }
}
