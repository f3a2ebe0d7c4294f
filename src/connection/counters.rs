// Connection-scoped counters

use crate::rtmp::{BandwidthLimitType, DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_ACK_SIZE};

/// Flow-control bookkeeping for one connection
///
/// Chunk sizes and the total bytes read/written counters live with
/// the chunk reader and writer that own them; this struct tracks the
/// rest: acknowledgement windows, peer bandwidth and transaction ids.
pub struct ConnectionCounters {
    /// Window after which an acknowledgement must be sent, as set by
    /// the peer's WINDOW_ACK_SIZE
    pub read_window_ack_size: u32,

    /// Total-bytes-read value at the moment the last ACK went out
    pub bytes_at_last_ack: u64,

    /// Peer bandwidth announced by SET_PEER_BANDWIDTH
    pub peer_bandwidth: u32,
    pub peer_bandwidth_limit: BandwidthLimitType,

    next_transaction_id: u32,
}

impl ConnectionCounters {
    pub fn new(read_window_ack_size: u32) -> ConnectionCounters {
        ConnectionCounters {
            read_window_ack_size,
            bytes_at_last_ack: 0,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
            peer_bandwidth_limit: BandwidthLimitType::Dynamic,
            next_transaction_id: 1,
        }
    }

    /// Allocates the next transaction id. The first call returns 1,
    /// which belongs to `connect`.
    pub fn next_transaction_id(&mut self) -> f64 {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        id as f64
    }

    /// Returns the acknowledgement value to send when a full window
    /// has been read since the last ACK
    pub fn ack_due(&mut self, total_bytes_read: u64) -> Option<u32> {
        if self.read_window_ack_size == 0 {
            return None;
        }

        if total_bytes_read - self.bytes_at_last_ack >= self.read_window_ack_size as u64 {
            self.bytes_at_last_ack = total_bytes_read;
            return Some(total_bytes_read as u32);
        }

        None
    }
}

impl Default for ConnectionCounters {
    fn default() -> ConnectionCounters {
        ConnectionCounters::new(DEFAULT_WINDOW_ACK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_start_at_one() {
        let mut counters = ConnectionCounters::default();

        assert_eq!(counters.next_transaction_id(), 1.0);
        assert_eq!(counters.next_transaction_id(), 2.0);
        assert_eq!(counters.next_transaction_id(), 3.0);
    }

    #[test]
    fn test_ack_cadence() {
        let mut counters = ConnectionCounters::new(1000);

        // No ack before a full window
        assert_eq!(counters.ack_due(999), None);

        // One ack at the window, none immediately after
        assert_eq!(counters.ack_due(1000), Some(1000));
        assert_eq!(counters.ack_due(1400), None);

        // The next window counts from the last ack
        assert_eq!(counters.ack_due(2000), Some(2000));
    }

    #[test]
    fn test_zero_window_never_acks() {
        let mut counters = ConnectionCounters::new(0);
        assert_eq!(counters.ack_due(u64::MAX / 2), None);
    }
}
