//! Interactive anchor placement
//!
//! Placement asks a [`PointInput`] for two points. The anchor exists as soon
//! as the command starts so the host can preview it; cancelling at either
//! prompt discards it together with everything else the command did.

use crate::anchor::Anchor;
use crate::error::EditError;
use crate::scene::ObjectId;
use crate::session::{EditOutcome, Session};
use kurbo::Point;
use std::collections::VecDeque;
use tracing::debug;

/// Answer to a point prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromptResult {
    Point(Point),
    Cancelled,
}

/// Source of user-picked points
pub trait PointInput {
    /// Ask for a point; `base` is the rubber-band origin, if any
    fn get_point(&mut self, prompt: &str, base: Option<Point>) -> PromptResult;
}

/// Point input replaying a fixed list of answers
///
/// Once the list is exhausted every prompt is cancelled.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    answers: VecDeque<PromptResult>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    pub fn new(answers: impl IntoIterator<Item = PromptResult>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    /// Input answering with the given points in order
    pub fn points(points: impl IntoIterator<Item = Point>) -> Self {
        Self::new(points.into_iter().map(PromptResult::Point))
    }

    /// Prompts seen so far
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl PointInput for ScriptedInput {
    fn get_point(&mut self, prompt: &str, _base: Option<Point>) -> PromptResult {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().unwrap_or(PromptResult::Cancelled)
    }
}

pub const FIRST_POINT_PROMPT: &str = "Specify first point";
pub const SECOND_POINT_PROMPT: &str = "Specify second point";

/// Place a new anchor from two prompted points
///
/// Returns `Ok(None)` if the user cancelled or the scene refused the new
/// anchor. The annotation is created when the placement command commits.
pub fn place_anchor(
    session: &mut Session,
    input: &mut dyn PointInput,
) -> Result<Option<ObjectId>, EditError> {
    if session.scene().is_read_only() {
        debug!("placement refused on read-only scene");
        return Ok(None);
    }
    session.begin_command("place_anchor")?;
    let anchor = Anchor::new(session.config());
    let id = session.insert_anchor(anchor);

    let PromptResult::Point(first) = input.get_point(FIRST_POINT_PROMPT, None) else {
        session.cancel_command()?;
        debug!("placement cancelled at first point");
        return Ok(None);
    };
    if !place(session, id, first, first)? {
        return Ok(None);
    }

    let PromptResult::Point(second) = input.get_point(SECOND_POINT_PROMPT, Some(first)) else {
        session.cancel_command()?;
        debug!("placement cancelled at second point");
        return Ok(None);
    };
    if !place(session, id, first, second)? {
        return Ok(None);
    }

    session.commit_command()?;
    Ok(Some(id))
}

/// Apply a placement step; a refused edit cancels the whole command
fn place(session: &mut Session, id: ObjectId, start: Point, end: Point) -> Result<bool, EditError> {
    match session.place_segment(id, start, end) {
        Ok(EditOutcome::Denied) => {
            session.cancel_command()?;
            debug!(%id, "placement refused");
            Ok(false)
        }
        Ok(_) => Ok(true),
        Err(error) => {
            session.cancel_command()?;
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;

    #[test]
    fn test_place_two_points() {
        let mut session = Session::new(LinkConfig::default());
        let mut input = ScriptedInput::points([Point::new(0.0, 0.0), Point::new(0.0, 8.0)]);

        let id = place_anchor(&mut session, &mut input).unwrap().unwrap();
        let anchor = session.scene().anchor(id).unwrap();
        assert_eq!(anchor.anchor_point(), Point::new(0.0, 4.0));
        assert!(anchor.note_ref().is_some());
        assert_eq!(input.prompts(), &[FIRST_POINT_PROMPT, SECOND_POINT_PROMPT]);
        assert!(session.check_invariants().is_empty());
    }

    #[test]
    fn test_cancel_at_second_point_leaves_nothing() {
        let mut session = Session::new(LinkConfig::default());
        let mut input = ScriptedInput::points([Point::new(1.0, 1.0)]);

        assert_eq!(place_anchor(&mut session, &mut input), Ok(None));
        assert!(session.scene().is_empty());
        assert!(session.active_command().is_none());
    }

    #[test]
    fn test_read_only_scene_refuses_placement() {
        let mut session = Session::new(LinkConfig::default());
        session.scene_mut().set_read_only(true);
        let mut input = ScriptedInput::points([Point::new(3.0, 3.0), Point::new(13.0, 3.0)]);

        assert_eq!(place_anchor(&mut session, &mut input), Ok(None));
        assert!(session.scene().is_empty());
        assert!(session.active_command().is_none());
        assert!(input.prompts().is_empty());
    }

    #[test]
    fn test_locked_anchor_cancels_placement() {
        let mut session = Session::new(LinkConfig::default());
        let next = ObjectId(session.scene().next_id());
        session.scene_mut().lock(next);
        let mut input = ScriptedInput::points([Point::new(3.0, 3.0), Point::new(13.0, 3.0)]);

        assert_eq!(place_anchor(&mut session, &mut input), Ok(None));
        assert!(session.scene().is_empty());
        assert!(session.active_command().is_none());
        assert_eq!(input.prompts(), &[FIRST_POINT_PROMPT]);
    }

    #[test]
    fn test_cancel_at_first_point() {
        let mut session = Session::new(LinkConfig::default());
        let mut input = ScriptedInput::new([PromptResult::Cancelled]);
        assert_eq!(place_anchor(&mut session, &mut input), Ok(None));
        assert!(session.scene().is_empty());
    }
}
