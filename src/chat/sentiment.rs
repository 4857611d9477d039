use serde::Serialize;

use super::{ChatBackend, ChatTurn, UpstreamError};

const SYSTEM_MESSAGE: &str = "\
You are an emotion analysis expert specializing in measuring happiness levels. \
Analyze text on a scale of 1 to 10, where:

1: Deeply sad - Expressions of severe depression, grief, or despair
2: Very sad - Strong feelings of sadness, loss, or hopelessness
3: Sad - Clear negative emotions, disappointment, or unhappiness
4: Slightly sad - Mild melancholy or minor disappointment
5: Neutral - Neither sad nor happy, or mixed emotions
6: Slightly happy - Mild contentment or small pleasures
7: Moderately happy - Clear positive feelings and satisfaction
8: Happy - Strong positive emotions and joy
9: Very happy - Great enthusiasm and delight
10: Ecstatic - Pure joy, elation, or extreme happiness

Guidelines:
- Identify emotional keywords and intensity
- Consider tone, punctuation, and context
- Evaluate presence of positive/negative emotions
- Emojis, exclamation marks, and laughter add positivity

Response Format:
HAPPINESS SCORE: [1-10]
EMOTION STATE: [Sad/Neutral/Happy]
REASONING: [Brief explanation]
";

const PRIMER_REPLY: &str =
    "I understand. I will analyze text and return a structured response.";

const SCORE_TAG: &str = "HAPPINESS SCORE:";
const STATE_TAG: &str = "EMOTION STATE:";
const REASONING_TAG: &str = "REASONING:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentReport {
    pub score: u8,
    #[serde(rename = "sentiment")]
    pub emotion: String,
    pub reasoning: Option<String>,
}

/// Score `text` on the 1-10 happiness scale.
pub async fn analyze_sentiment(
    backend: &dyn ChatBackend,
    text: &str,
) -> Result<SentimentReport, UpstreamError> {
    let history = [ChatTurn::user(SYSTEM_MESSAGE), ChatTurn::model(PRIMER_REPLY)];
    let reply = backend
        .send(
            &history,
            &format!("Analyze the happiness level in this text: {text}"),
        )
        .await?;

    parse_report(&reply).ok_or(UpstreamError::Unparseable(reply))
}

/// Pull the tagged fields out of a structured reply.
pub fn parse_report(reply: &str) -> Option<SentimentReport> {
    let score: u8 = tagged_value(reply, SCORE_TAG)?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    if !(1..=10).contains(&score) {
        return None;
    }

    let emotion = tagged_value(reply, STATE_TAG).filter(|s| !s.is_empty())?;
    let reasoning = tagged_value(reply, REASONING_TAG).filter(|s| !s.is_empty());

    Some(SentimentReport {
        score,
        emotion,
        reasoning,
    })
}

/// Text following `tag` on the first line containing it, with markdown
/// emphasis stripped.
fn tagged_value(reply: &str, tag: &str) -> Option<String> {
    reply.lines().find_map(|line| {
        let (_, rest) = line.split_once(tag)?;
        Some(rest.trim().trim_matches('*').trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_parse_plain_reply() {
        let reply = "HAPPINESS SCORE: 8\nEMOTION STATE: Happy\nREASONING: Upbeat wording.";
        let report = parse_report(reply).unwrap();
        assert_eq!(report.score, 8);
        assert_eq!(report.emotion, "Happy");
        assert_eq!(report.reasoning.as_deref(), Some("Upbeat wording."));
    }

    #[test]
    fn test_parse_markdown_reply() {
        let reply = "**HAPPINESS SCORE:** 2  \n**EMOTION STATE:** Sad  \n";
        let report = parse_report(reply).unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.emotion, "Sad");
        assert_eq!(report.reasoning, None);
    }

    #[test]
    fn test_parse_rejects_out_of_range_score() {
        assert!(parse_report("HAPPINESS SCORE: 11\nEMOTION STATE: Happy").is_none());
        assert!(parse_report("HAPPINESS SCORE: 0\nEMOTION STATE: Sad").is_none());
    }

    #[test]
    fn test_parse_requires_both_fields() {
        assert!(parse_report("HAPPINESS SCORE: 5").is_none());
        assert!(parse_report("EMOTION STATE: Neutral").is_none());
        assert!(parse_report("I cannot help with that.").is_none());
    }

    struct Recording {
        seen: Mutex<Vec<(usize, String)>>,
        reply: String,
    }

    #[async_trait]
    impl ChatBackend for Recording {
        async fn send(&self, history: &[ChatTurn], message: &str) -> Result<String, UpstreamError> {
            self.seen
                .lock()
                .unwrap()
                .push((history.len(), message.to_string()));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_analyze_primes_history() {
        let backend = Recording {
            seen: Mutex::new(Vec::new()),
            reply: "HAPPINESS SCORE: 9\nEMOTION STATE: Happy".into(),
        };
        let report = analyze_sentiment(&backend, "great day").await.unwrap();
        assert_eq!(report.score, 9);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, 2);
        assert_eq!(seen[0].1, "Analyze the happiness level in this text: great day");
    }

    #[tokio::test]
    async fn test_analyze_unparseable_reply() {
        let backend = Recording {
            seen: Mutex::new(Vec::new()),
            reply: "no idea".into(),
        };
        assert!(matches!(
            analyze_sentiment(&backend, "meh").await,
            Err(UpstreamError::Unparseable(_))
        ));
    }
}
