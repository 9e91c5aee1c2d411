/*
 * Copyright (c) 2022 McSib
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use thiserror::Error;

use crate::download::Tally;
use crate::io::locale::Messages;

/// Template used for every download pass.
const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} {msg}";

/// A builder that helps in making a new [ProgressStyle] for use.
pub(crate) struct ProgressStyleBuilder {
    progress_style: ProgressStyle,
}

impl ProgressStyleBuilder {
    /// Sets the template of the progress style, keeping the default bar if the template is rejected.
    pub(crate) fn template(mut self, msg_template: &str) -> Self {
        match self.progress_style.clone().template(msg_template) {
            Ok(style) => self.progress_style = style,
            Err(err) => warn!("Template error with '{msg_template}': {err}. Using default bar."),
        }
        self
    }

    pub(crate) fn progress_chars(mut self, chars: &str) -> Self {
        self.progress_style = self.progress_style.progress_chars(chars);
        self
    }

    pub(crate) fn build(self) -> ProgressStyle {
        self.progress_style
    }
}

impl Default for ProgressStyleBuilder {
    fn default() -> Self {
        Self {
            progress_style: ProgressStyle::default_bar(),
        }
    }
}

/// A builder that helps in initializing and configuring a new [ProgressBar] for use.
pub(crate) struct ProgressBarBuilder {
    progress_bar: ProgressBar,
}

impl ProgressBarBuilder {
    pub(crate) fn new(len: u64) -> Self {
        Self {
            progress_bar: ProgressBar::new(len),
        }
    }

    pub(crate) fn style(self, progress_style: ProgressStyle) -> Self {
        self.progress_bar.set_style(progress_style);
        self
    }

    pub(crate) fn draw_target(self, target: ProgressDrawTarget) -> Self {
        self.progress_bar.set_draw_target(target);
        self
    }

    pub(crate) fn prefix(self, prefix: &str) -> Self {
        self.progress_bar.set_prefix(prefix.to_string());
        self
    }

    pub(crate) fn steady_tick(self, duration: Duration) -> Self {
        self.progress_bar.enable_steady_tick(duration);
        self
    }

    pub(crate) fn build(self) -> ProgressBar {
        self.progress_bar
    }
}

/// The progress bar shown while a list of posts is downloaded.
pub(crate) fn download_bar(len: usize, label: &str) -> ProgressBar {
    let style = ProgressStyleBuilder::default()
        .template(PROGRESS_TEMPLATE)
        .progress_chars("#>-")
        .build();

    ProgressBarBuilder::new(len as u64)
        .style(style)
        .draw_target(ProgressDrawTarget::stderr_with_hz(5))
        .prefix(label)
        .steady_tick(Duration::from_millis(200))
        .build()
}

/// Why a numbered menu answer was refused.
#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum SelectionError {
    #[error("\"{0}\" is not a number")]
    NotANumber(String),
    #[error("{choice} is not between 1 and {len}")]
    OutOfRange { choice: usize, len: usize },
}

/// Turns a 1-based menu answer into an index into a list of `len` items.
pub(crate) fn parse_selection(input: &str, len: usize) -> Result<usize, SelectionError> {
    let trimmed = input.trim();
    let choice: usize = trimmed
        .parse()
        .map_err(|_| SelectionError::NotANumber(trimmed.to_string()))?;

    if choice == 0 || choice > len {
        return Err(SelectionError::OutOfRange { choice, len });
    }
    Ok(choice - 1)
}

/// Reads one line of input after `prompt`. Empty answers are allowed.
pub(crate) fn ask(prompt: &str) -> Result<String> {
    let answer: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(answer.trim().to_string())
}

/// What came of offering a list of matches to the user.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pick<T> {
    /// There was nothing to pick from.
    Nothing,
    Chosen(T),
    Refused(SelectionError),
}

/// Picks one of `items`. A lone item is taken without asking; with more, `answer` supplies
/// a 1-based menu choice.
pub(crate) fn pick_one<T, F>(items: &[T], answer: F) -> Result<Pick<T>>
where
    T: Clone,
    F: FnOnce() -> Result<String>,
{
    match items {
        [] => Ok(Pick::Nothing),
        [only] => Ok(Pick::Chosen(only.clone())),
        _ => Ok(match parse_selection(&answer()?, items.len()) {
            Ok(index) => Pick::Chosen(items[index].clone()),
            Err(err) => Pick::Refused(err),
        }),
    }
}

/// Prints `items` as a numbered list and reads the answer.
pub(crate) fn ask_numbered<T: AsRef<str>>(heading: &str, prompt: &str, items: &[T]) -> Result<String> {
    println!("\n{heading}");
    for (i, item) in items.iter().enumerate() {
        println!("[{}] {}", i + 1, item.as_ref());
    }
    ask(prompt)
}

/// Blocks until the user presses Enter.
pub(crate) fn pause(messages: &Messages) {
    let _ = Input::<String>::new()
        .with_prompt(messages.get("press_enter"))
        .allow_empty(true)
        .interact_text();
}

/// Prints the end-of-run counts, plus the skip log path when something was logged.
pub(crate) fn print_summary(messages: &Messages, tally: &Tally, skip_log: &Path) {
    println!("\n{}", style(messages.get("done")).green().bold());
    println!("{} {}", messages.get("summary_new"), tally.new);
    println!("{} {}", messages.get("summary_cached"), tally.cached);
    println!("{} {}", messages.get("summary_skipped"), tally.skipped);
    println!("{} {}", messages.get("summary_corrupted"), tally.corrupted);
    println!("{} {}", messages.get("summary_failed"), tally.failed);
    if tally.has_complaints() {
        println!("{} {}", messages.get("summary_log"), skip_log.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_one_based() {
        assert_eq!(parse_selection("1", 2), Ok(0));
        assert_eq!(parse_selection(" 2 ", 2), Ok(1));
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        assert_eq!(
            parse_selection("3", 2),
            Err(SelectionError::OutOfRange { choice: 3, len: 2 })
        );
        assert_eq!(
            parse_selection("0", 2),
            Err(SelectionError::OutOfRange { choice: 0, len: 2 })
        );
    }

    #[test]
    fn non_numeric_selection_is_rejected() {
        assert_eq!(
            parse_selection("e621", 2),
            Err(SelectionError::NotANumber("e621".into()))
        );
        assert!(parse_selection("-1", 2).is_err());
        assert!(parse_selection("", 2).is_err());
    }

    #[test]
    fn lone_item_is_taken_without_asking() {
        let picked = pick_one(&["patreon"], || panic!("should not ask")).unwrap();
        assert_eq!(picked, Pick::Chosen("patreon"));
        assert_eq!(pick_one::<&str, _>(&[], || panic!("should not ask")).unwrap(), Pick::Nothing);
    }

    #[test]
    fn answer_picks_from_several() {
        let items = ["fanbox", "patreon"];
        assert_eq!(pick_one(&items, || Ok("2".into())).unwrap(), Pick::Chosen("patreon"));
        assert_eq!(
            pick_one(&items, || Ok("9".into())).unwrap(),
            Pick::Refused(SelectionError::OutOfRange { choice: 9, len: 2 })
        );
    }

    #[test]
    fn bad_template_keeps_a_usable_style() {
        let style = ProgressStyleBuilder::default().template("{bar:notacolor.}}").build();
        let bar = ProgressBarBuilder::new(3)
            .style(style)
            .draw_target(ProgressDrawTarget::hidden())
            .build();
        bar.inc(1);
        assert_eq!(bar.position(), 1);
    }
}
