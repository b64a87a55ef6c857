// src/dispatcher.rs
//
// Maps keyboard actions onto frame processor calls, with a filter that
// locks out history traversal and threshold changes whenever they would
// corrupt an output file being written at the same time.

use anyhow::Result;
use opencv::core::Mat;

use crate::processor::VideoFrameProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Next,
    Back,
    Capture,
    ThresholdUp,
    ThresholdDown,
    Stop,
}

pub struct Dispatcher {
    interactive: bool,
    capture_video: bool,
    top_10: bool,
    csv: bool,
}

impl Dispatcher {
    pub fn new(interactive: bool, capture_video: bool, top_10: bool, csv: bool) -> Self {
        Self {
            interactive,
            capture_video,
            top_10,
            csv,
        }
    }

    /// Going backwards or rethresholding would corrupt the stats or the
    /// captured video, so those actions become a plain advance whenever
    /// an output file is in play. Without a keyboard it doesn't matter,
    /// but the same rule keeps unattended runs marching forward.
    fn filter_action(&self, action: Action) -> Action {
        if !self.interactive || self.top_10 || self.csv || self.capture_video {
            match action {
                Action::Next | Action::Stop | Action::Capture => action,
                _ => Action::Next,
            }
        } else {
            action
        }
    }

    /// Run one action against the processor. None means stop, either by
    /// request or because the file ran out.
    pub fn dispatch(
        &self,
        action: Action,
        processor: &mut VideoFrameProcessor,
    ) -> Result<Option<Mat>> {
        match self.filter_action(action) {
            Action::Next => processor.next_frame(),
            Action::Back => processor.previous_frame(),
            Action::Capture => processor.capture_current_frame(),
            Action::ThresholdUp => {
                processor.image_threshold_up();
                processor.reprocess_last_frame()
            }
            Action::ThresholdDown => {
                processor.image_threshold_down();
                processor.reprocess_last_frame()
            }
            Action::Stop => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_session_keeps_all_actions() {
        let dispatcher = Dispatcher::new(true, false, false, false);

        for action in [
            Action::Next,
            Action::Back,
            Action::Capture,
            Action::ThresholdUp,
            Action::ThresholdDown,
            Action::Stop,
        ] {
            assert_eq!(
                dispatcher.filter_action(action),
                action,
                "plain interactive session shouldn't rewrite actions"
            );
        }
    }

    #[test]
    fn test_output_files_lock_out_history_and_threshold() {
        // csv, capture_video and top_10 each force the lockout.
        for dispatcher in [
            Dispatcher::new(true, true, false, false),
            Dispatcher::new(true, false, true, false),
            Dispatcher::new(true, false, false, true),
        ] {
            assert_eq!(dispatcher.filter_action(Action::Back), Action::Next);
            assert_eq!(dispatcher.filter_action(Action::ThresholdUp), Action::Next);
            assert_eq!(
                dispatcher.filter_action(Action::ThresholdDown),
                Action::Next
            );
            assert_eq!(dispatcher.filter_action(Action::Stop), Action::Stop);
            assert_eq!(dispatcher.filter_action(Action::Capture), Action::Capture);
        }
    }

    #[test]
    fn test_unattended_run_only_advances() {
        let dispatcher = Dispatcher::new(false, false, false, false);

        assert_eq!(dispatcher.filter_action(Action::Back), Action::Next);
        assert_eq!(dispatcher.filter_action(Action::ThresholdUp), Action::Next);
        assert_eq!(dispatcher.filter_action(Action::Stop), Action::Stop);
    }
}
