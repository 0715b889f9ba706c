use crate::domain::models::{TimeBlock, Todo};
use crate::domain::palette::{ColorId, DEFAULT_BLOCK_COLOR};
use std::collections::BTreeMap;

/// A manual override wins whenever a color is set, even the default one.
/// Otherwise a single distinct project among the tasks gives its color, and
/// anything else falls back to the default.
pub fn resolve_display_color<'a, I, F>(block: &TimeBlock, tasks: I, project_color: F) -> ColorId
where
    I: IntoIterator<Item = &'a Todo>,
    F: Fn(&str) -> Option<ColorId>,
{
    if block.color_is_manual {
        if let Some(color) = block.color {
            return color;
        }
    }

    let projects = tasks
        .into_iter()
        .filter_map(|task| task.project_id.as_deref())
        .filter_map(|project_id| project_color(project_id).map(|color| (project_id, color)))
        .collect::<BTreeMap<_, _>>();

    if projects.len() == 1 {
        projects.into_values().next().unwrap_or(DEFAULT_BLOCK_COLOR)
    } else {
        DEFAULT_BLOCK_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn block() -> TimeBlock {
        TimeBlock::new(
            "blk-1",
            "Focus",
            fixed_time("2026-02-16T09:00:00Z"),
            fixed_time("2026-02-16T10:00:00Z"),
            fixed_time("2026-02-16T08:00:00Z"),
        )
    }

    fn task(id: &str, project_id: Option<&str>) -> Todo {
        let mut todo = Todo::new(id, id, fixed_time("2026-02-16T08:00:00Z"));
        todo.project_id = project_id.map(ToOwned::to_owned);
        todo
    }

    fn colors() -> HashMap<&'static str, ColorId> {
        HashMap::from([("work", ColorId::Blue), ("home", ColorId::Green)])
    }

    fn resolve(block: &TimeBlock, tasks: &[Todo]) -> ColorId {
        let colors = colors();
        resolve_display_color(block, tasks, |id| colors.get(id).copied())
    }

    #[test]
    fn manual_override_beats_project_color() {
        let mut block = block();
        block.color = Some(ColorId::Red);
        block.color_is_manual = true;
        let tasks = vec![task("a", Some("work")), task("b", Some("work"))];
        assert_eq!(resolve(&block, &tasks), ColorId::Red);
    }

    #[test]
    fn manual_override_wins_even_when_it_equals_the_default() {
        let mut block = block();
        block.color = Some(DEFAULT_BLOCK_COLOR);
        block.color_is_manual = true;
        assert_eq!(resolve(&block, &[task("a", Some("home"))]), DEFAULT_BLOCK_COLOR);
    }

    #[test]
    fn stored_color_without_manual_flag_is_ignored() {
        let mut block = block();
        block.color = Some(ColorId::Red);
        assert_eq!(resolve(&block, &[task("a", Some("home"))]), ColorId::Green);
    }

    #[test]
    fn single_project_supplies_the_color() {
        let tasks = vec![task("a", Some("home")), task("b", None), task("c", Some("home"))];
        assert_eq!(resolve(&block(), &tasks), ColorId::Green);
    }

    #[test]
    fn mixed_or_missing_projects_fall_back_to_default() {
        assert_eq!(resolve(&block(), &[]), DEFAULT_BLOCK_COLOR);
        assert_eq!(resolve(&block(), &[task("a", None)]), DEFAULT_BLOCK_COLOR);
        let mixed = vec![task("a", Some("home")), task("b", Some("work"))];
        assert_eq!(resolve(&block(), &mixed), DEFAULT_BLOCK_COLOR);
        assert_eq!(resolve(&block(), &[task("a", Some("deleted"))]), DEFAULT_BLOCK_COLOR);
    }
}
