//! Append-only conversation log

use super::turn::{Part, Role, Turn};
use crate::error::ConversationError;

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Create a conversation that starts with one user turn
    pub fn with_seed<S: Into<String>>(seed: S) -> Self {
        Self {
            turns: vec![Turn::user(seed)],
        }
    }

    /// Append a turn, rejecting it if it would break the sequencing rules
    pub fn append(&mut self, turn: Turn) -> Result<(), ConversationError> {
        self.check_shape(&turn)?;

        if turn.role() == Role::ToolResult {
            self.check_answers_last_model_turn(&turn)?;
        }

        self.turns.push(turn);
        Ok(())
    }

    /// Read-only view of every turn in order
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent model turn, if any
    pub fn last_model_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role() == Role::Model)
    }

    /// Whether the invocations of the turn at `index` have been answered
    pub fn is_answered(&self, index: usize) -> bool {
        is_answered(&self.turns, index)
    }

    fn check_shape(&self, turn: &Turn) -> Result<(), ConversationError> {
        let offending = match turn.role() {
            Role::User => turn
                .parts()
                .iter()
                .find(|p| !matches!(p, Part::Text { .. })),
            Role::Model => turn.parts().iter().find(|p| matches!(p, Part::Result(_))),
            Role::ToolResult => turn
                .parts()
                .iter()
                .find(|p| !matches!(p, Part::Result(_))),
        };

        if offending.is_some() {
            return Err(invalid(format!(
                "a {} turn cannot carry that kind of part",
                turn.role().as_str()
            )));
        }

        if turn.role() == Role::ToolResult && turn.parts().is_empty() {
            return Err(invalid("a tool-result turn must carry at least one result"));
        }

        Ok(())
    }

    fn check_answers_last_model_turn(&self, turn: &Turn) -> Result<(), ConversationError> {
        let previous = self
            .turns
            .last()
            .filter(|t| t.role() == Role::Model)
            .ok_or_else(|| invalid("a tool-result turn must directly follow a model turn"))?;

        let invocations = previous.invocations();
        let results = turn.results();

        if invocations.is_empty() {
            return Err(invalid("the preceding model turn issued no invocations"));
        }

        if invocations.len() != results.len() {
            return Err(invalid(format!(
                "expected {} results, got {}",
                invocations.len(),
                results.len()
            )));
        }

        for (position, (invocation, result)) in invocations.iter().zip(&results).enumerate() {
            if invocation.id != result.invocation_id || invocation.name != result.invocation_name
            {
                return Err(invalid(format!(
                    "result {} answers '{}' but invocation {} is '{}'",
                    position, result.invocation_name, position, invocation.name
                )));
            }
        }

        Ok(())
    }
}

/// Whether the model turn at `index` is followed by the tool-result turn answering it.
/// Turns without invocations count as answered.
pub fn is_answered(turns: &[Turn], index: usize) -> bool {
    match turns.get(index) {
        Some(turn) if turn.has_invocations() => turns
            .get(index + 1)
            .is_some_and(|next| next.role() == Role::ToolResult),
        Some(_) => true,
        None => false,
    }
}

fn invalid<S: Into<String>>(reason: S) -> ConversationError {
    ConversationError::InvalidSequence {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ToolInvocation, ToolResult};
    use serde_json::{json, Map};

    fn query_call(query: &str) -> ToolInvocation {
        let mut args = Map::new();
        args.insert("query".into(), json!(query));
        ToolInvocation::new("executeQuery", args)
    }

    #[test]
    fn test_append_preserves_order() {
        let mut conversation = Conversation::new();
        for i in 0..5 {
            conversation.append(Turn::user(format!("message {}", i))).unwrap();
            conversation
                .append(Turn::model(Some(format!("reply {}", i)), vec![]))
                .unwrap();
        }

        let texts: Vec<String> = conversation
            .snapshot()
            .iter()
            .map(|t| t.text().unwrap())
            .collect();
        assert_eq!(texts.len(), 10);
        assert_eq!(texts[0], "message 0");
        assert_eq!(texts[9], "reply 4");
    }

    #[test]
    fn test_tool_result_must_follow_model_turn() {
        let mut conversation = Conversation::new();
        conversation.append(Turn::user("list accounts")).unwrap();

        let orphan = query_call("{ actor { accounts { id } } }");
        let err = conversation
            .append(Turn::tool_results(vec![ToolResult::value(&orphan, json!("{}"))]))
            .unwrap_err();

        assert!(matches!(err, ConversationError::InvalidSequence { .. }));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_tool_result_count_mismatch_rejected() {
        let mut conversation = Conversation::new();
        let first = query_call("{ a }");
        let second = query_call("{ b }");
        conversation.append(Turn::user("two things")).unwrap();
        conversation
            .append(Turn::model(None, vec![first.clone(), second]))
            .unwrap();

        let err = conversation
            .append(Turn::tool_results(vec![ToolResult::value(&first, json!(1))]))
            .unwrap_err();

        assert!(matches!(err, ConversationError::InvalidSequence { .. }));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_tool_result_order_mismatch_rejected() {
        let mut conversation = Conversation::new();
        let first = query_call("{ a }");
        let second = query_call("{ b }");
        conversation.append(Turn::user("two things")).unwrap();
        conversation
            .append(Turn::model(None, vec![first.clone(), second.clone()]))
            .unwrap();

        let swapped = Turn::tool_results(vec![
            ToolResult::value(&second, json!(2)),
            ToolResult::value(&first, json!(1)),
        ]);
        assert!(conversation.append(swapped).is_err());

        let ordered = Turn::tool_results(vec![
            ToolResult::value(&first, json!(1)),
            ToolResult::value(&second, json!(2)),
        ]);
        assert!(conversation.append(ordered).is_ok());
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_second_tool_result_turn_rejected() {
        let mut conversation = Conversation::new();
        let call = query_call("{ a }");
        conversation.append(Turn::user("q")).unwrap();
        conversation.append(Turn::model(None, vec![call.clone()])).unwrap();
        conversation
            .append(Turn::tool_results(vec![ToolResult::value(&call, json!(1))]))
            .unwrap();

        let again = Turn::tool_results(vec![ToolResult::value(&call, json!(1))]);
        assert!(conversation.append(again).is_err());
    }

    #[test]
    fn test_part_shapes_enforced() {
        let mut conversation = Conversation::new();
        let call = query_call("{ a }");

        let user_with_call = Turn::new(Role::User, vec![Part::Invocation(call.clone())]);
        assert!(conversation.append(user_with_call).is_err());

        let empty_results = Turn::tool_results(vec![]);
        assert!(conversation.append(empty_results).is_err());

        assert!(conversation.is_empty());
    }

    #[test]
    fn test_trailing_user_turns_tolerated() {
        let mut conversation = Conversation::with_seed("Use account ID 1 for ongoing queries.");
        conversation.append(Turn::user("interrupted question")).unwrap();
        conversation.append(Turn::user("next question")).unwrap();
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_is_answered() {
        let mut conversation = Conversation::new();
        let call = query_call("{ a }");
        conversation.append(Turn::user("q")).unwrap();
        conversation.append(Turn::model(None, vec![call.clone()])).unwrap();
        assert!(!conversation.is_answered(1));

        conversation
            .append(Turn::tool_results(vec![ToolResult::value(&call, json!(1))]))
            .unwrap();
        assert!(conversation.is_answered(1));
        assert!(conversation.is_answered(0));
        assert!(!conversation.is_answered(7));
    }

    #[test]
    fn test_last_model_turn() {
        let mut conversation = Conversation::new();
        assert!(conversation.last_model_turn().is_none());

        conversation.append(Turn::user("hi")).unwrap();
        conversation.append(Turn::model(Some("hello".into()), vec![])).unwrap();
        conversation.append(Turn::user("again")).unwrap();

        assert_eq!(
            conversation.last_model_turn().and_then(|t| t.text()).as_deref(),
            Some("hello")
        );
    }
}
