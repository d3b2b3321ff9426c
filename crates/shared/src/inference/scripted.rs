use std::sync::{Arc, Mutex};

use super::{Fragment, FragmentStream, InferenceEngine};

const DEFAULT_FRAGMENT_CHARS: usize = 24;

/// Replays canned replies in order, cycling once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    replies: Arc<Vec<String>>,
    fragment_chars: usize,
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Debug, Default)]
struct ScriptState {
    next_reply: usize,
    prompts: Vec<String>,
}

impl ScriptedEngine {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(replies.into_iter().map(Into::into).collect()),
            fragment_chars: DEFAULT_FRAGMENT_CHARS,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    pub fn with_fragment_chars(mut self, fragment_chars: usize) -> Self {
        self.fragment_chars = fragment_chars.max(1);
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.prompts.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, prompt: String) -> String {
        let Ok(mut state) = self.state.lock() else {
            return String::new();
        };
        state.prompts.push(prompt);
        if self.replies.is_empty() {
            return String::new();
        }

        let reply = self.replies[state.next_reply % self.replies.len()].clone();
        state.next_reply += 1;
        reply
    }
}

impl InferenceEngine for ScriptedEngine {
    fn generate(&self, prompt: String) -> FragmentStream {
        let reply = self.next_reply(prompt);
        let fragments = split_fragments(&reply, self.fragment_chars);
        let (sender, stream) = FragmentStream::channel();

        tokio::spawn(async move {
            for fragment in fragments {
                if sender.send(Ok(fragment)).await.is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        });

        stream
    }
}

fn split_fragments(reply: &str, fragment_chars: usize) -> Vec<Fragment> {
    let chars = reply.chars().collect::<Vec<_>>();
    let mut fragments = chars
        .chunks(fragment_chars)
        .map(|chunk| Fragment::partial(chunk.iter().collect::<String>()))
        .collect::<Vec<_>>();

    match fragments.last_mut() {
        Some(last) => last.done = true,
        None => fragments.push(Fragment::last("")),
    }
    fragments
}
