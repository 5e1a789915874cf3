// FramePort - persistent lock-free input queue for the beat detector
//
// Frames travel from the producer (audio callback / spectrum front-end) to
// the detector through two SPSC ring buffers, so neither side allocates or
// locks once the port is built:
// - DATA ring: producer pushes filled packets, detector consumes
// - POOL ring: detector returns drained packets, producer recycles
//
// Packet flow:
// 1. Producer pops an empty packet from POOL
// 2. Producer copies the frame in (or marks the packet as "no data")
// 3. Producer pushes the packet to DATA
// 4. Detector pops from DATA, processes, pushes the packet back to POOL
//
// The port lives for the whole session; the detector drains it once per
// quantum instead of re-registering a handler.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::DetectorError;

/// Default number of frames the port can hold in flight
pub const DEFAULT_PORT_CAPACITY: usize = 64;

/// One pre-allocated slot travelling between the two rings
#[derive(Debug)]
struct FramePacket {
    data: Vec<f32>,
    has_data: bool,
}

/// Producer side of a [`FramePort`]
pub struct FrameSender {
    data_producer: Producer<FramePacket>,
    pool_consumer: Consumer<FramePacket>,
    bands: usize,
}

/// Consumer side of a [`FramePort`]
pub struct FrameReceiver {
    data_consumer: Consumer<FramePacket>,
    pool_producer: Producer<FramePacket>,
}

/// Lock-free frame queue built from a data ring and a recycle ring
pub struct FramePort;

impl FramePort {
    /// Create a port with `capacity` pre-allocated frames of `bands` values
    ///
    /// # Panics
    /// Panics if `capacity` or `bands` is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize, bands: usize) -> (FrameSender, FrameReceiver) {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(bands > 0, "bands must be greater than 0");

        let (mut pool_producer, pool_consumer) = RingBuffer::new(capacity);
        let (data_producer, data_consumer) = RingBuffer::new(capacity);

        for _ in 0..capacity {
            let packet = FramePacket {
                data: vec![0.0_f32; bands],
                has_data: false,
            };
            // The pool ring was created with room for exactly `capacity` packets.
            if pool_producer.push(packet).is_err() {
                unreachable!("pool ring sized for every packet");
            }
        }

        (
            FrameSender {
                data_producer,
                pool_consumer,
                bands,
            },
            FrameReceiver {
                data_consumer,
                pool_producer,
            },
        )
    }
}

impl FrameSender {
    /// Queue a copy of `frame`
    ///
    /// # Errors
    /// - `FrameLengthMismatch` if `frame` does not have the port's band count
    /// - `PortFull` if every packet is waiting to be drained
    /// - `PortClosed` if the receiver has been dropped
    pub fn send(&mut self, frame: &[f32]) -> Result<(), DetectorError> {
        if frame.len() != self.bands {
            return Err(DetectorError::FrameLengthMismatch {
                expected: self.bands,
                actual: frame.len(),
            });
        }

        self.push_with(|packet| {
            packet.data.copy_from_slice(frame);
            packet.has_data = true;
        })
    }

    /// Queue a "no data" marker for this quantum
    pub fn send_no_data(&mut self) -> Result<(), DetectorError> {
        self.push_with(|packet| packet.has_data = false)
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Number of free packets the producer can still fill
    pub fn available(&self) -> usize {
        self.pool_consumer.slots()
    }

    fn push_with(&mut self, fill: impl FnOnce(&mut FramePacket)) -> Result<(), DetectorError> {
        if self.data_producer.is_abandoned() {
            return Err(DetectorError::PortClosed);
        }

        let mut packet = self
            .pool_consumer
            .pop()
            .map_err(|_| DetectorError::PortFull)?;
        fill(&mut packet);

        self.data_producer
            .push(packet)
            .map_err(|_| DetectorError::PortFull)
    }
}

impl FrameReceiver {
    /// Hand the oldest pending packet to `f` and recycle it afterwards
    ///
    /// `f` receives `Some(frame)` for data packets and `None` for "no data"
    /// markers.
    ///
    /// # Returns
    /// `None` when the port is empty, otherwise the closure's result.
    pub fn recv_with<R>(&mut self, f: impl FnOnce(Option<&[f32]>) -> R) -> Option<R> {
        let packet = self.data_consumer.pop().ok()?;
        let result = f(packet.has_data.then_some(packet.data.as_slice()));
        // Both rings hold `capacity` slots, so a returned packet always fits.
        let _ = self.pool_producer.push(packet);
        Some(result)
    }

    /// Number of packets waiting to be drained
    pub fn pending(&self) -> usize {
        self.data_consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.data_consumer.is_empty()
    }

    /// True once the sender has been dropped
    pub fn is_closed(&self) -> bool {
        self.data_consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_starts_with_full_pool() {
        let (sender, receiver) = FramePort::new(8, 4);
        assert_eq!(sender.available(), 8);
        assert_eq!(receiver.pending(), 0);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_frames_arrive_in_order() {
        let (mut sender, mut receiver) = FramePort::new(4, 2);
        sender.send(&[1.0, 2.0]).unwrap();
        sender.send_no_data().unwrap();
        sender.send(&[3.0, 4.0]).unwrap();

        let mut seen = Vec::new();
        while let Some(frame) = receiver.recv_with(|frame| frame.map(<[f32]>::to_vec)) {
            seen.push(frame);
        }

        assert_eq!(seen, vec![Some(vec![1.0, 2.0]), None, Some(vec![3.0, 4.0])]);
        assert_eq!(sender.available(), 4);
    }

    #[test]
    fn test_full_port_reports_backpressure() {
        let (mut sender, mut receiver) = FramePort::new(2, 1);
        sender.send(&[1.0]).unwrap();
        sender.send(&[2.0]).unwrap();
        assert_eq!(sender.send(&[3.0]), Err(DetectorError::PortFull));

        receiver.recv_with(|_| ());
        assert!(sender.send(&[3.0]).is_ok());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let (mut sender, receiver) = FramePort::new(2, 3);
        assert_eq!(
            sender.send(&[1.0]),
            Err(DetectorError::FrameLengthMismatch {
                expected: 3,
                actual: 1
            })
        );
        assert_eq!(receiver.pending(), 0);
    }

    #[test]
    fn test_dropped_receiver_closes_port() {
        let (mut sender, receiver) = FramePort::new(2, 1);
        drop(receiver);
        assert_eq!(sender.send(&[1.0]), Err(DetectorError::PortClosed));
    }

    #[test]
    fn test_dropped_sender_is_visible() {
        let (sender, receiver) = FramePort::new(2, 1);
        assert!(!receiver.is_closed());
        drop(sender);
        assert!(receiver.is_closed());
    }
}
