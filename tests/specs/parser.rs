// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream-json parse scenario: tool_use then result, in order.

use orchard_engine::print::StreamParser;

#[test]
fn bash_tool_then_result_emit_ordered_markers() {
    let mut parser = StreamParser::new();
    let mut chunks = parser.feed(
        "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"tool_use\",\"name\":\"Bash\",\"id\":\"t1\",\"input\":{\"command\":\"ls\"}}]}}\n",
    );
    chunks.extend(parser.feed("{\"type\":\"result\",\"result\":\"a\\nb\\n\"}\n"));

    assert_eq!(
        chunks,
        vec![
            "@@TOOL:Bash@@\n@@CMD:ls@@\n".to_string(),
            "@@OUTPUT@@\na\nb\n\n@@END@@\n".to_string(),
        ]
    );
}
