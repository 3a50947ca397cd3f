// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context snapshot assembled for each tick's LLM call.

use orchard_core::{
    ActivityEntry, AgentSession, ChatMessage, DetectedPattern, MergeQueueEntry, Worktree,
};

/// Everything the model sees about the current project state.
#[derive(Debug, Default, Clone)]
pub struct ContextSnapshot {
    pub project_name: String,
    pub project_id: String,
    pub pending_messages: Vec<ChatMessage>,
    pub sessions: Vec<AgentSession>,
    pub worktrees: Vec<Worktree>,
    pub merge_queue_head: Option<MergeQueueEntry>,
    pub merge_queue_len: usize,
    pub recent_patterns: Vec<DetectedPattern>,
    pub recent_decisions: Vec<ActivityEntry>,
}

impl ContextSnapshot {
    /// Render the snapshot as the user-turn text for the LLM call.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Project: {} ({})\n\n",
            self.project_name, self.project_id
        ));

        out.push_str("## Unprocessed user messages\n");
        if self.pending_messages.is_empty() {
            out.push_str("(none)\n");
        }
        for message in &self.pending_messages {
            out.push_str(&format!("- [{}] {}\n", message.id, message.text));
        }

        out.push_str("\n## Agent sessions\n");
        if self.sessions.is_empty() {
            out.push_str("(none)\n");
        }
        for session in &self.sessions {
            out.push_str(&format!(
                "- session {} on worktree {} [{}], resumes: {}\n",
                session.id, session.worktree_id, session.status, session.resume_count
            ));
        }

        out.push_str("\n## Worktrees\n");
        for worktree in &self.worktrees {
            let role = if worktree.is_main { " (main)" } else { "" };
            let mut flags = Vec::new();
            if worktree.merged {
                flags.push("merged");
            }
            if worktree.archived {
                flags.push("archived");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            out.push_str(&format!(
                "- {} branch {}{}{}: ahead {}, behind {}, modified {}, staged {}, untracked {}\n",
                worktree.id,
                worktree.branch,
                role,
                flags,
                worktree.status.ahead,
                worktree.status.behind,
                worktree.status.modified,
                worktree.status.staged,
                worktree.status.untracked,
            ));
        }

        out.push_str("\n## Merge queue\n");
        match &self.merge_queue_head {
            Some(head) => out.push_str(&format!(
                "head: branch {} from worktree {} ({} entries total)\n",
                head.branch, head.worktree_id, self.merge_queue_len
            )),
            None => out.push_str("(empty)\n"),
        }

        out.push_str("\n## Recent terminal patterns\n");
        if self.recent_patterns.is_empty() {
            out.push_str("(none)\n");
        }
        for pattern in &self.recent_patterns {
            let handled = if pattern.handled { "handled" } else { "unhandled" };
            out.push_str(&format!(
                "- {} on session {} ({}): {}\n",
                pattern.pattern_type, pattern.session_id, handled, pattern.content
            ));
        }

        out.push_str("\n## Recent decisions\n");
        if self.recent_decisions.is_empty() {
            out.push_str("(none)\n");
        }
        for entry in &self.recent_decisions {
            out.push_str(&format!("- {}\n", entry.summary));
        }

        out
    }
}

/// System prompt for the orchestrator model.
pub const SYSTEM_PROMPT: &str = "You are the orchestrator of a fleet of coding agents, \
each working in its own git worktree of one repository. Decompose user goals into tasks, \
spawn worktrees and agents, monitor their terminal output, merge completed branches, and \
keep the user informed. Use the provided tools to act; when there is nothing useful to do, \
make no tool calls.";
