use crate::node::NodeType;
use crate::types::RunState;

/// Decides which node runs next
pub trait Router: Send + Sync {
    fn next(&self, state: &RunState, current: NodeType) -> NextNode;
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextNode {
    LLM,
    Tool,
    End,
}

/// LLM -> Tool (while the model requests tools) -> LLM -> End
pub struct SimpleRouter;

impl Router for SimpleRouter {
    fn next(&self, state: &RunState, current: NodeType) -> NextNode {
        match current {
            NodeType::LLM => {
                if state.has_pending_tool_calls() {
                    NextNode::Tool
                } else {
                    NextNode::End
                }
            }
            NodeType::Tool => NextNode::LLM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_llm::{Message, ToolCall};

    fn state_ending_with(message: Message) -> RunState {
        let mut state = RunState::new("r".into(), "s".into(), vec![], Message::human("hi"));
        state.add_message(message);
        state
    }

    #[test]
    fn test_llm_with_tool_calls_routes_to_tool() {
        let state = state_ending_with(Message::ai_with_tools(vec![ToolCall::function("c", "t", "{}")]));
        assert_eq!(SimpleRouter.next(&state, NodeType::LLM), NextNode::Tool);
    }

    #[test]
    fn test_llm_without_tool_calls_ends() {
        let state = state_ending_with(Message::ai("done"));
        assert_eq!(SimpleRouter.next(&state, NodeType::LLM), NextNode::End);
    }

    #[test]
    fn test_tool_routes_back_to_llm() {
        let state = state_ending_with(Message::tool_result("c", "ok"));
        assert_eq!(SimpleRouter.next(&state, NodeType::Tool), NextNode::LLM);
    }
}
