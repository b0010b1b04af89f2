use crate::model::Alignment;

/// Horizontal offset of a line's content inside its available width.
pub fn line_offset(alignment: Alignment, available: f32, content: f32) -> f32 {
    let slack = (available - content).max(0.0);
    match alignment {
        Alignment::Left | Alignment::Justify => 0.0,
        Alignment::Center => slack / 2.0,
        Alignment::Right => slack,
    }
}

/// Extra advance added at each whitespace gap of a justified line.
pub fn justify_extra(available: f32, content: f32, space_count: usize) -> f32 {
    if space_count == 0 {
        return 0.0;
    }
    ((available - content) / space_count as f32).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_alignment() {
        assert_eq!(line_offset(Alignment::Left, 100.0, 60.0), 0.0);
        assert_eq!(line_offset(Alignment::Center, 100.0, 60.0), 20.0);
        assert_eq!(line_offset(Alignment::Right, 100.0, 60.0), 40.0);
        assert_eq!(line_offset(Alignment::Justify, 100.0, 60.0), 0.0);
    }

    #[test]
    fn overfull_line_is_not_shifted() {
        assert_eq!(line_offset(Alignment::Right, 50.0, 80.0), 0.0);
    }

    #[test]
    fn justify_extra_fills_exactly() {
        let extra = justify_extra(200.0, 170.0, 4);
        assert_eq!(extra * 4.0 + 170.0, 200.0);
        assert_eq!(justify_extra(200.0, 170.0, 0), 0.0);
    }
}
