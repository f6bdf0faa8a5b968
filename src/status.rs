//! 状态输出 - 每次状态变化（开始复制、等待、完成、删除、放弃）都会发到这里

use chrono::{DateTime, Local};
use std::sync::Mutex;

/// 一条状态消息
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// 显示名（监视对名称或提取出的标题）
    pub label: String,
    pub message: String,
    pub at: DateTime<Local>,
}

impl StatusEvent {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
            at: Local::now(),
        }
    }
}

/// 状态输出接口，实现不能阻塞也不能失败
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);

    fn status(&self, label: &str, message: &str) {
        self.emit(StatusEvent::new(label, message));
    }
}

/// 写入 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn emit(&self, event: StatusEvent) {
        tracing::info!(
            target: "mediasync::status",
            "[{}] {}: {}",
            event.at.format("%Y-%m-%dT%H:%M:%S"),
            event.label,
            event.message
        );
    }
}

/// 保存在内存中，便于嵌入方查询
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// 消息中包含 `needle` 的条数
    pub fn count_containing(&self, needle: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }
}

impl StatusSink for MemoryStatusSink {
    fn emit(&self, event: StatusEvent) {
        // 锁中毒时丢弃，不影响调用方
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryStatusSink::new();
        sink.status("Shows", "a.mkv moved successfully");
        sink.status("Shows", "b.mkv is in use, waiting");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].label, "Shows");
        assert_eq!(sink.count_containing("moved successfully"), 1);
    }
}
