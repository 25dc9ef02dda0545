use std::sync::mpsc::Sender;

/// Evaluation lifecycle of one population member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    Idle,
    Running,
    Done,
}

/// A probe that produced an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub generation: usize,
    pub member: usize,
    /// Display name of the member that produced the hit.
    pub name: String,
    pub probe: String,
    pub outcome: String,
    /// Answered from the result cache rather than the network.
    pub cached: bool,
    /// Keyword that let the hit through the filter, if one is configured.
    pub keyword: Option<String>,
}

/// Observer of a running search. Called concurrently from evaluation tasks.
pub trait ProgressCallback: Send + Sync {
    fn on_generation_start(&self, generation: usize, population_size: usize);
    fn on_member_state(&self, generation: usize, member: usize, state: MemberState);
    fn on_hit(&self, hit: &Hit);
    fn on_generation_complete(&self, generation: usize, best_score: u32, average_score: f64);
}

/// Prints hits to stdout and progress to the log.
pub struct ConsoleProgressCallback {
    request_mode: bool,
}

impl ConsoleProgressCallback {
    pub fn new(request_mode: bool) -> Self {
        Self { request_mode }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&self, generation: usize, population_size: usize) {
        log::info!("Generation {} starting ({} members)...", generation + 1, population_size);
    }

    fn on_member_state(&self, generation: usize, member: usize, state: MemberState) {
        log::debug!("generation {} member {}: {:?}", generation + 1, member, state);
    }

    fn on_hit(&self, hit: &Hit) {
        if hit.cached {
            log::info!("{}: cache hit for {}", hit.name, hit.probe);
        }
        if self.request_mode {
            println!("{}\ngenerated request: \n{}\n", hit.outcome, hit.probe);
        } else if let Some(keyword) = &hit.keyword {
            println!("{} ({})({})", hit.outcome, hit.probe, keyword);
        } else {
            println!("{} ({})", hit.outcome, hit.probe);
        }
    }

    fn on_generation_complete(&self, generation: usize, best_score: u32, average_score: f64) {
        log::info!(
            "Generation {} complete. Best score: {}, average: {:.2}",
            generation + 1,
            best_score,
            average_score
        );
    }
}

pub struct NullProgressCallback;

impl ProgressCallback for NullProgressCallback {
    fn on_generation_start(&self, _generation: usize, _population_size: usize) {}
    fn on_member_state(&self, _generation: usize, _member: usize, _state: MemberState) {}
    fn on_hit(&self, _hit: &Hit) {}
    fn on_generation_complete(&self, _generation: usize, _best_score: u32, _average_score: f64) {}
}

// For consumers that want the events on another thread
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart { generation: usize, population_size: usize },
    MemberState { generation: usize, member: usize, state: MemberState },
    Hit(Hit),
    GenerationComplete { generation: usize, best_score: u32, average_score: f64 },
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&self, generation: usize, population_size: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart {
            generation,
            population_size,
        });
    }

    fn on_member_state(&self, generation: usize, member: usize, state: MemberState) {
        let _ = self.sender.send(ProgressMessage::MemberState {
            generation,
            member,
            state,
        });
    }

    fn on_hit(&self, hit: &Hit) {
        let _ = self.sender.send(ProgressMessage::Hit(hit.clone()));
    }

    fn on_generation_complete(&self, generation: usize, best_score: u32, average_score: f64) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            generation,
            best_score,
            average_score,
        });
    }
}
