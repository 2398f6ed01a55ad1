//! Random command producer used to exercise a running pipeline.
//!
//! One producer task runs per configured command type. Each iteration builds
//! a random command of that type, publishes it under a fresh trace id, and
//! sleeps a random delay before the next one.

use std::time::Duration;

use itemq_core::{Command, CommandType, ItemId, TraceContext};
use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info};

use crate::broker::Publisher;

/// Payload letters drawn for generated `AddItem` commands.
const PAYLOAD_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProducerError {
    #[error("cannot produce commands of unknown type {0}")]
    UnknownCommandType(i32),
}

/// Builds a random command of the given type.
///
/// `AddItem` gets a random non-negative id and a single-letter payload,
/// `GetItem` and `RemoveItem` a random non-negative id, `GetAllItems` no
/// fields at all.
///
/// # Errors
///
/// Returns `ProducerError::UnknownCommandType` for `CommandType::Unknown`.
pub fn random_command<R: Rng + ?Sized>(
    command_type: CommandType,
    rng: &mut R,
) -> Result<Command, ProducerError> {
    let command = match command_type {
        CommandType::AddItem => {
            let letter = PAYLOAD_LETTERS[rng.random_range(0..PAYLOAD_LETTERS.len())];
            Command::add_item(random_id(rng), char::from(letter).to_string())
        }
        CommandType::GetItem => Command::get_item(random_id(rng)),
        CommandType::RemoveItem => Command::remove_item(random_id(rng)),
        CommandType::GetAllItems => Command::get_all_items(),
        CommandType::Unknown(raw) => return Err(ProducerError::UnknownCommandType(raw)),
    };
    Ok(command)
}

fn random_id<R: Rng + ?Sized>(rng: &mut R) -> ItemId {
    rng.random_range(0..=ItemId::MAX)
}

/// Random pause in `[0, max)`. A zero `max` means no pause.
pub fn random_delay<R: Rng + ?Sized>(max: Duration, rng: &mut R) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.random_range(0..max_ms))
}

/// Publishes random commands of `command_type` until `stop` flips to `true`.
///
/// Publish failures are logged and the loop keeps going.
///
/// # Errors
///
/// Returns `ProducerError::UnknownCommandType` for `CommandType::Unknown`,
/// before anything is published.
pub async fn run_producer(
    publisher: Publisher,
    command_type: CommandType,
    max_send_delay: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), ProducerError> {
    info!(command_type = %command_type, queue = publisher.queue_name(), "producer started");

    loop {
        if *stop.borrow() {
            break;
        }

        // ThreadRng is not Send: draw everything before the first await.
        let (command, delay) = {
            let mut rng = rand::rng();
            let command = random_command(command_type, &mut rng)?;
            (command, random_delay(max_send_delay, &mut rng))
        };
        let trace = TraceContext::new(uuid::Uuid::new_v4().to_string());

        if let Err(e) = publisher.publish(&command, &trace).await {
            error!(trace_id = %trace, error = %e, "failed to publish command");
        }

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(command_type = %command_type, "producer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::broker::{DeliveryStream, MemoryBroker};

    #[test]
    fn random_add_item_has_letter_payload_and_non_negative_id() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let command = random_command(CommandType::AddItem, &mut rng).unwrap();
            assert_eq!(command.command_type(), CommandType::AddItem);
            assert!(command.item_id() >= 0);
            let payload = command.item_payload();
            assert_eq!(payload.len(), 1);
            assert!(("A"..="Y").contains(&payload));
        }
    }

    #[test]
    fn random_get_all_has_no_fields() {
        let mut rng = StdRng::seed_from_u64(1);
        let command = random_command(CommandType::GetAllItems, &mut rng).unwrap();
        assert_eq!(command, Command::get_all_items());
    }

    #[test]
    fn random_command_rejects_unknown_type() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            random_command(CommandType::Unknown(11), &mut rng),
            Err(ProducerError::UnknownCommandType(11))
        );
    }

    #[test]
    fn random_delay_stays_below_max() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(random_delay(Duration::ZERO, &mut rng), Duration::ZERO);
        for _ in 0..200 {
            assert!(random_delay(Duration::from_millis(50), &mut rng) < Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn producer_publishes_until_stopped() {
        let broker = MemoryBroker::new(64);
        let publisher = broker.publisher("items", Duration::from_secs(1));
        let mut consumer = broker.consumer("items").unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run_producer(
            publisher,
            CommandType::GetItem,
            Duration::from_millis(5),
            stop_rx,
        ));

        let first = consumer.next_delivery().await.unwrap().unwrap();
        assert!(first.headers.contains_key(itemq_core::TRACE_ID_HEADER));

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn producer_fails_fast_on_unknown_type() {
        let broker = MemoryBroker::new(4);
        let publisher = broker.publisher("items", Duration::from_secs(1));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let result =
            run_producer(publisher, CommandType::Unknown(9), Duration::ZERO, stop_rx).await;
        assert_eq!(result, Err(ProducerError::UnknownCommandType(9)));
    }
}
