//! Threaded meter: a capture side pushes blocks, one worker runs the
//! [`IndicatorEngine`] and publishes events. Both queues are bounded and
//! drop their oldest entry when full.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::audio::indicators::IndicatorEngine;
use crate::audio::samples::{MeterEvent, SampleBlock};
use crate::config::AnalysisConfig;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub blocks_processed: u64,
    pub blocks_dropped: u64,
    pub events_dropped: u64,
}

/// Sends `item`, evicting the oldest queued entries through `evict` while the
/// queue is full. Returns how many entries were evicted, or the item back if
/// every receiver is gone.
pub fn push_drop_oldest<T>(tx: &Sender<T>, evict: &Receiver<T>, mut item: T) -> Result<u64, T> {
    let mut evicted = 0;
    loop {
        match tx.try_send(item) {
            Ok(()) => return Ok(evicted),
            Err(TrySendError::Full(back)) => {
                item = back;
                if evict.try_recv().is_ok() {
                    evicted += 1;
                }
            }
            Err(TrySendError::Disconnected(back)) => return Err(back),
        }
    }
}

/// Capture-side handle. Dropping it stops the stream once queued blocks are
/// processed.
pub struct BlockSender {
    tx: Sender<SampleBlock>,
    evict: Receiver<SampleBlock>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl BlockSender {
    /// Queues `block`; never blocks. Returns false once the worker has stopped.
    pub fn push(&self, block: SampleBlock) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        match push_drop_oldest(&self.tx, &self.evict, block) {
            Ok(0) => true,
            Ok(evicted) => {
                self.dropped.fetch_add(evicted, Ordering::Relaxed);
                log::warn!("Block queue full, dropped {} oldest block(s)", evicted);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Consumer-side handle: the event queue and the worker.
pub struct MeterStream {
    events: Receiver<MeterEvent>,
    handle: Option<JoinHandle<EngineResult<StreamStats>>>,
    dropped: Arc<AtomicU64>,
}

impl MeterStream {
    pub fn events(&self) -> &Receiver<MeterEvent> {
        &self.events
    }

    /// Blocks until the next event, `None` once the worker finished and the
    /// queue is drained.
    pub fn recv(&self) -> Option<MeterEvent> {
        self.events.recv().ok()
    }

    pub fn iter(&self) -> crossbeam_channel::Iter<'_, MeterEvent> {
        self.events.iter()
    }

    /// Waits for the worker. The block sender must be dropped first or this
    /// never returns.
    pub fn join(mut self) -> EngineResult<StreamStats> {
        let handle = self.handle.take().ok_or(EngineError::WorkerPanicked)?;
        let mut stats = handle.join().map_err(|_| EngineError::WorkerPanicked)??;
        stats.blocks_dropped = self.dropped.load(Ordering::Relaxed);
        Ok(stats)
    }
}

/// Starts a meter worker with queues of `capacity` entries on each side.
pub fn spawn(config: AnalysisConfig, capacity: usize) -> EngineResult<(BlockSender, MeterStream)> {
    if capacity == 0 {
        return Err(EngineError::InvalidConfig("queue capacity must be positive".into()));
    }
    let mut engine = IndicatorEngine::new(config)?;

    let (block_tx, block_rx) = bounded::<SampleBlock>(capacity);
    let block_evict = block_rx.clone();
    let (event_tx, event_rx) = bounded::<MeterEvent>(capacity);
    let event_evict = event_rx.clone();
    let running = Arc::new(AtomicBool::new(true));
    let dropped = Arc::new(AtomicU64::new(0));

    let worker_running = running.clone();
    let handle = thread::Builder::new()
        .name("noisemeter-worker".into())
        .spawn(move || {
            let mut stats = StreamStats::default();
            let mut events = Vec::new();
            let result = loop {
                let block = match block_rx.recv() {
                    Ok(block) => block,
                    // every sender dropped and the queue is drained
                    Err(_) => break Ok(()),
                };
                events.clear();
                if let Err(err) = engine.process_into(&block, &mut events) {
                    break Err(err);
                }
                stats.blocks_processed += 1;
                for event in events.drain(..) {
                    match push_drop_oldest(&event_tx, &event_evict, event) {
                        Ok(evicted) => stats.events_dropped += evicted,
                        Err(_) => stats.events_dropped += 1,
                    }
                }
            };
            worker_running.store(false, Ordering::Release);
            match result {
                Ok(()) => {
                    log::info!(
                        "Meter worker stopped: {} blocks, {} events dropped, {} frames dropped",
                        stats.blocks_processed,
                        stats.events_dropped,
                        engine.frames_dropped()
                    );
                    Ok(stats)
                }
                Err(err) => {
                    log::error!("Meter worker failed: {}", err);
                    Err(err)
                }
            }
        })?;

    log::info!("Meter worker started (queue capacity {})", capacity);
    Ok((
        BlockSender {
            tx: block_tx,
            evict: block_evict,
            running,
            dropped: dropped.clone(),
        },
        MeterStream {
            events: event_rx,
            handle: Some(handle),
            dropped,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::samples::BlockStatus;

    #[test]
    fn test_push_drop_oldest() {
        let (tx, rx) = bounded(2);
        assert_eq!(push_drop_oldest(&tx, &rx, 1), Ok(0));
        assert_eq!(push_drop_oldest(&tx, &rx, 2), Ok(0));
        assert_eq!(push_drop_oldest(&tx, &rx, 3), Ok(1));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_stream_end_to_end() {
        let (sender, stream) = spawn(AnalysisConfig::default(), 16).unwrap();
        for i in 1..=3 {
            assert!(sender.push(SampleBlock::new(i * 125, vec![0.05; 1000], 8000)));
        }
        assert!(sender.push(SampleBlock::aborted(375, Vec::new(), 8000)));
        drop(sender);

        let events: Vec<MeterEvent> = stream.iter().collect();
        assert_eq!(events.len(), 7);
        assert!(matches!(events[0], MeterEvent::Indicators(_)));
        assert!(matches!(events[1], MeterEvent::Spectrum(_)));
        assert_eq!(
            events[6],
            MeterEvent::Aborted {
                epoch: 375,
                status: BlockStatus::Aborted
            }
        );

        let stats = stream.join().unwrap();
        assert_eq!(
            stats,
            StreamStats {
                blocks_processed: 4,
                blocks_dropped: 0,
                events_dropped: 0
            }
        );
    }

    #[test]
    fn test_event_queue_drops_oldest() {
        let (sender, stream) = spawn(AnalysisConfig::default(), 2).unwrap();
        let mut block = SampleBlock::new(375, vec![0.05; 3000], 8000);
        block.status = BlockStatus::Aborted;
        assert!(sender.push(block));
        drop(sender);

        // nothing is read until the worker is done
        let events = stream.events().clone();
        let stats = stream.join().unwrap();
        assert_eq!(stats.blocks_processed, 1);
        assert_eq!(stats.events_dropped, 5);
        let kept: Vec<MeterEvent> = events.try_iter().collect();
        assert_eq!(kept.len(), 2);
        assert!(matches!(kept[0], MeterEvent::Spectrum(_)));
        assert!(kept[1].is_terminal());
    }

    #[test]
    fn test_block_queue_drops_oldest() {
        let (sender, stream) = spawn(AnalysisConfig::default(), 1).unwrap();
        // ten seconds of audio keep the worker busy while the queue overflows
        assert!(sender.push(SampleBlock::new(10_000, vec![0.05; 480_000], 48000)));
        for i in 1..=3 {
            assert!(sender.push(SampleBlock::new(10_000 + i, vec![0.05; 48], 48000)));
        }
        assert!(sender.push(SampleBlock::aborted(10_004, Vec::new(), 48000)));
        drop(sender);

        let events = stream.events().clone();
        let stats = stream.join().unwrap();
        assert!(stats.blocks_dropped > 0);
        assert_eq!(stats.blocks_processed + stats.blocks_dropped, 5);
        let kept: Vec<MeterEvent> = events.try_iter().collect();
        assert_eq!(
            kept,
            vec![MeterEvent::Aborted {
                epoch: 10_004,
                status: BlockStatus::Aborted
            }]
        );
    }

    #[test]
    fn test_final_block_at_unusable_rate() {
        let (sender, stream) = spawn(AnalysisConfig::default(), 4).unwrap();
        assert!(sender.push(SampleBlock::device_error(42, 0)));
        drop(sender);

        let events: Vec<MeterEvent> = stream.iter().collect();
        assert_eq!(
            events,
            vec![MeterEvent::Aborted {
                epoch: 42,
                status: BlockStatus::DeviceError
            }]
        );
        assert_eq!(stream.join().unwrap().blocks_processed, 1);
    }

    #[test]
    fn test_worker_error_is_reported() {
        let (sender, stream) = spawn(AnalysisConfig::default(), 4).unwrap();
        assert!(sender.push(SampleBlock::new(0, vec![0.0; 4], 8)));
        let result = stream.join();
        assert!(matches!(
            result,
            Err(EngineError::NoTransformLength { sample_rate: 8, .. })
        ));
        assert!(!sender.is_running());
        assert!(!sender.push(SampleBlock::new(0, vec![0.0; 4], 8000)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            spawn(AnalysisConfig::default(), 0),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
