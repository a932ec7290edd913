//! Project-related API methods.
//!
//! This module contains methods for getting or altering project-level
//! information.

use crate::error::*;
use crate::types::*;
use crate::Project;

/// ## Project APIs
impl Project {
    /// Returns the number of objects of a specified type in the project.
    ///
    /// # Parameters
    /// - `count_type`: The type of object to count, represented by the
    ///   [`CountType`] enum.
    ///
    /// # Returns
    /// - `Ok(i32)`: The number of objects of the given type.
    pub fn get_count(&self, count_type: CountType) -> Result<i32> {
        let n = match count_type {
            CountType::NodeCount => self.network.nnodes(),
            CountType::TankCount => self.network.ntanks(),
            CountType::LinkCount => self.network.nlinks(),
            CountType::PatternCount => self.network.patterns.len(),
            CountType::CurveCount => self.network.curves.len(),
            CountType::ControlCount => self.network.controls.len(),
            CountType::RuleCount => self.network.rules.len(),
        };
        Ok(n as i32)
    }

    /// Returns the project title as up to three lines joined by newlines.
    pub fn get_title(&self) -> Result<String> {
        Ok(self
            .title
            .iter()
            .map(|s| s.trim_end())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Sets the three title lines of the project. Lines longer than
    /// [`MAX_TITLE_SIZE`] characters are truncated.
    pub fn set_title(&mut self, line1: &str, line2: &str, line3: &str) -> Result<()> {
        for (slot, line) in self.title.iter_mut().zip([line1, line2, line3]) {
            let mut text = line.to_string();
            text.truncate(MAX_TITLE_SIZE);
            *slot = text;
        }
        Ok(())
    }

    /// Returns the text of the error message that corresponds to an error
    /// code.
    pub fn get_error(code: i32) -> String {
        let mut message = crate::error::error_message(code).to_string();
        message.truncate(MAX_MSG_SIZE);
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    fn counts_track_network_contents(ph: Project) {
        assert_eq!(ph.get_count(CountType::NodeCount), Ok(4));
        assert_eq!(ph.get_count(CountType::TankCount), Ok(2));
        assert_eq!(ph.get_count(CountType::LinkCount), Ok(4));
        for count_type in CountType::iter() {
            assert!(ph.get_count(count_type).unwrap() >= 0);
        }
    }

    #[rstest]
    fn title_round_trips(mut ph: Project) {
        ph.set_title("line one", "line two", "").unwrap();
        assert_eq!(ph.get_title().unwrap(), "line one\nline two\n");
    }

    #[test]
    fn error_messages_resolve() {
        assert_eq!(Project::get_error(215), "duplicate ID");
        assert_eq!(Project::get_error(-1), "unknown error");
    }
}
