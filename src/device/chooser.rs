use std::io::{self, Write};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use futures::channel::mpsc::{Receiver, Sender};
use log::warn;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use crate::device::platform::DeviceChooser;
use crate::device::types::{DeviceCandidate, DeviceEvent};

pub struct FirstMatch;

#[async_trait]
impl DeviceChooser for FirstMatch {
    async fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

// lists the devices on stdout and reads the choice from stdin
pub struct PromptChooser;

// "1" selects the first candidate; an empty line, "q" or anything out of range cancels
pub fn parse_choice(line: &str, count: usize) -> Option<usize> {
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("q") {
        return None;
    }

    match line.parse::<usize>() {
        Ok(number) if number >= 1 && number <= count => Some(number - 1),
        _ => None,
    }
}

#[async_trait]
impl DeviceChooser for PromptChooser {
    async fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        let mut prompt = String::from("Devices advertising a battery service:\n");
        for (index, candidate) in candidates.iter().enumerate() {
            prompt.push_str(&format!("  {}. {}\n", index + 1, candidate));
        }
        prompt.push_str("Select a device (empty line to cancel): ");

        let count = candidates.len();
        let answer = spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line)
        }).await;

        match answer {
            Ok(Ok(line)) => parse_choice(&line, count),
            Ok(Err(err)) => {
                warn!("Failed to read device choice: {}", err);
                None
            },
            Err(err) => {
                warn!("Failed to join device prompt task: {}", err);
                None
            },
        }
    }
}

// sends DeviceEvent::ChooseDevice and waits for the answer on a separate channel
pub struct ChannelChooser {
    events: Sender<DeviceEvent>,
    answers: Mutex<Receiver<Option<usize>>>,
}

impl ChannelChooser {
    pub fn new(events: Sender<DeviceEvent>, answers: Receiver<Option<usize>>) -> Self {
        ChannelChooser {
            events,
            answers: Mutex::new(answers),
        }
    }
}

#[async_trait]
impl DeviceChooser for ChannelChooser {
    async fn choose(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        let mut events = self.events.clone();
        if let Err(err) = events.send(DeviceEvent::ChooseDevice(candidates.to_vec())).await {
            warn!("Failed to present device chooser: {}", err);
            return None;
        }

        let mut answers = self.answers.lock().await;
        answers.next().await.flatten()
    }
}
