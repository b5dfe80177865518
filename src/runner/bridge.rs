//! Bridge from parsed agent events to runner lifecycle events.

use std::collections::HashMap;

use crate::runner::events::{EventSink, RunnerEvent};
use crate::runner::stream::{AgentEvent, ContentBlock};

/// Stateful mapper from [`AgentEvent`]s to [`RunnerEvent`]s. Tracks in-flight
/// tool-use ids so results can be reported under their tool name.
pub struct EventBridge {
    events: EventSink,
    inflight_tools: HashMap<String, String>,
}

impl EventBridge {
    pub fn new(events: EventSink) -> Self {
        Self {
            events,
            inflight_tools: HashMap::new(),
        }
    }

    pub fn handle(&mut self, event: AgentEvent) {
        match event {
            // The runner announces itself separately; the session header
            // carries nothing the dashboard needs.
            AgentEvent::SessionStart { .. } => {}
            AgentEvent::Assistant {
                blocks,
                input_tokens,
                output_tokens,
            } => {
                if input_tokens > 0 || output_tokens > 0 {
                    self.events.emit(RunnerEvent::StatsUpdate {
                        input_tokens,
                        output_tokens,
                        turns: 0,
                    });
                }
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => {
                            if !text.is_empty() {
                                self.events.emit(RunnerEvent::TextOutput { text });
                            }
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            self.inflight_tools.insert(id, name.clone());
                            self.events.emit(RunnerEvent::ToolStart {
                                tool_name: name,
                                input,
                            });
                        }
                    }
                }
            }
            AgentEvent::ToolResults { results } => {
                for result in results {
                    // Unknown ids resolve to an empty name; duplicates are
                    // harmless because removal is idempotent.
                    let tool_name = self
                        .inflight_tools
                        .remove(&result.tool_use_id)
                        .unwrap_or_default();
                    self.events.emit(RunnerEvent::ToolResult {
                        tool_name,
                        duration_ms: result.duration_ms,
                        truncated: result.truncated,
                    });
                }
            }
            AgentEvent::SessionEnd {
                turns,
                input_tokens,
                output_tokens,
                ..
            } => {
                self.events.emit(RunnerEvent::StatsUpdate {
                    input_tokens,
                    output_tokens,
                    turns,
                });
            }
            AgentEvent::RawOutput { text } => {
                if !text.is_empty() {
                    self.events.emit(RunnerEvent::TextOutput { text });
                }
            }
        }
    }
}
