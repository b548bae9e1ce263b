//! UseCase: メッセージのブロードキャスト
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - BroadcastMessageUseCase::execute() メソッド
//! - サーバータイムスタンプの付与、メッセージ履歴への記録、全接続への配送
//!
//! ### なぜこのテストが必要か
//! - サーバータイムスタンプがメッセージごとに一度だけ付与されることを保証
//! - 一部の宛先の失敗が他の宛先への配送を妨げないことを確認
//! - 遅いクライアントに対するポリシー（破棄 / 切断）を検証
//!
//! ### どのような状況を想定しているか
//! - 正常系：送信者を含む全接続への配送
//! - ポリシー：送信者除外、キュー満杯時の破棄と切断
//! - エッジケース：接続ゼロ、スタンプ済みメッセージ

use std::sync::Arc;

use hiroba_shared::time::Clock;
use tokio::sync::Mutex;

use crate::{
    config::{BroadcastPolicy, SlowClientPolicy},
    domain::{ConnectionId, Message, MessageLog, Timestamp},
    infrastructure::registry::{ClientRegistry, DeliveryOutcome},
};

use super::error::BroadcastError;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Server receipt time stamped on the message
    pub server_timestamp: Timestamp,
    /// Connections selected by the broadcast policy
    pub targets: usize,
    /// Enqueued for delivery
    pub delivered: usize,
    /// Skipped because the target's queue was full
    pub dropped: usize,
    /// Skipped because the target's writer was gone
    pub failed: usize,
}

/// メッセージブロードキャストのユースケース
pub struct BroadcastMessageUseCase {
    registry: Arc<ClientRegistry>,
    message_log: Arc<dyn MessageLog>,
    clock: Arc<dyn Clock>,
    broadcast_policy: BroadcastPolicy,
    slow_client_policy: SlowClientPolicy,
    /// Serializes broadcasts so stamp order, log order and enqueue order agree
    sequencer: Mutex<()>,
}

impl BroadcastMessageUseCase {
    pub fn new(
        registry: Arc<ClientRegistry>,
        message_log: Arc<dyn MessageLog>,
        clock: Arc<dyn Clock>,
        broadcast_policy: BroadcastPolicy,
        slow_client_policy: SlowClientPolicy,
    ) -> Self {
        Self {
            registry,
            message_log,
            clock,
            broadcast_policy,
            slow_client_policy,
            sequencer: Mutex::new(()),
        }
    }

    /// Stamp, record and fan out one message received from `from`.
    ///
    /// Broadcasts run one at a time, so stamping order, log order and
    /// per-queue enqueue order agree. The registry lock is taken only for the
    /// fan-out, after the message is recorded, so a slow `MessageLog` delays
    /// other broadcasts but never registration or deregistration.
    ///
    /// # Errors
    ///
    /// * `BroadcastError::Stamp` - the message was already stamped; nothing
    ///   is recorded or delivered.
    pub async fn execute(
        &self,
        from: ConnectionId,
        mut message: Message,
    ) -> Result<BroadcastReport, BroadcastError> {
        let _sequence = self.sequencer.lock().await;

        let server_timestamp = Timestamp::new(self.clock.now_millis());
        message.stamp(server_timestamp)?;

        self.message_log.record(message.clone()).await;

        // every recipient shares this one stamped value
        let message = Arc::new(message);
        let mut clients = self.registry.lock().await;
        let mut report = BroadcastReport {
            server_timestamp,
            targets: 0,
            delivered: 0,
            dropped: 0,
            failed: 0,
        };

        for (id, handle) in clients.iter_mut() {
            if !self.is_target(from, *id) {
                continue;
            }
            report.targets += 1;

            match handle.try_deliver(Arc::clone(&message)) {
                DeliveryOutcome::Queued => report.delivered += 1,
                DeliveryOutcome::QueueFull => {
                    report.dropped += 1;
                    match self.slow_client_policy {
                        SlowClientPolicy::DropMessage => {
                            tracing::warn!(
                                "Outbound queue of connection {} is full, dropping message",
                                id
                            );
                        }
                        SlowClientPolicy::Disconnect => {
                            tracing::warn!(
                                "Outbound queue of connection {} is full, disconnecting slow client",
                                id
                            );
                            handle.signal_close();
                        }
                    }
                }
                DeliveryOutcome::Closed => {
                    report.failed += 1;
                    tracing::warn!("Unable to send message to connection {}: writer closed", id);
                }
            }
        }

        tracing::debug!(
            "Broadcast from {} stamped at {}: {}/{} delivered, {} dropped, {} failed",
            from,
            server_timestamp.value(),
            report.delivered,
            report.targets,
            report.dropped,
            report.failed
        );

        Ok(report)
    }

    fn is_target(&self, from: ConnectionId, target: ConnectionId) -> bool {
        match self.broadcast_policy {
            BroadcastPolicy::IncludeSender => true,
            BroadcastPolicy::ExcludeSender => from != target,
        }
    }
}
