//! List numbering: running counters, marker text, indent composition and
//! list grouping, plus footnote/endnote numbering.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::layout::{NoteRef, Page};
use crate::model::{
    Document, Indent, LevelDefinition, NumberFormat, NumberingDefinitions, NumberingRef,
    Paragraph, RunContent, TextStyle,
};

/// Indent used per nesting depth when a level carries no metrics of its own.
const DEFAULT_LEVEL_STEP: f32 = 36.0;
const DEFAULT_HANGING: f32 = 18.0;

/// Per-(id, level) numbering metrics, as exposed by the document's numbering part.
pub trait NumberingProvider {
    /// Level definition with any instance override (start value) applied.
    fn level(&self, num_id: &str, level: u8) -> Option<Cow<'_, LevelDefinition>>;
    /// The instance overrides its abstract definition.
    fn has_override(&self, num_id: &str) -> bool;
}

impl NumberingProvider for NumberingDefinitions {
    fn level(&self, num_id: &str, level: u8) -> Option<Cow<'_, LevelDefinition>> {
        let instance = self.instances.get(num_id)?;
        let def = self.abstracts.get(&instance.abstract_id)?.levels.get(&level)?;
        match instance.overrides.get(&level).and_then(|o| o.start) {
            Some(start) => Some(Cow::Owned(LevelDefinition {
                start,
                ..def.clone()
            })),
            None => Some(Cow::Borrowed(def)),
        }
    }

    fn has_override(&self, num_id: &str) -> bool {
        self.instances
            .get(num_id)
            .is_some_and(|i| !i.overrides.is_empty())
    }
}

/// Footnote/endnote numbers as shown in the text.
pub trait NoteNumbering: Send + Sync {
    fn footnote_number(&self, id: u32) -> u32;
    fn endnote_number(&self, id: u32) -> u32;
}

/// Numbers notes 1, 2, 3... in order of first reference; unknown ids keep their own value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FirstReferenceNotes {
    footnotes: HashMap<u32, u32>,
    endnotes: HashMap<u32, u32>,
}

impl FirstReferenceNotes {
    pub fn from_document(doc: &Document) -> Self {
        let mut notes = Self::default();
        for para in doc.paragraphs_in_order() {
            notes.scan(para);
        }
        notes
    }

    /// Numbering recovered from laid-out pages, for layouts that were
    /// imported without their source document.
    pub fn from_pages(pages: &[Page]) -> Self {
        let mut notes = Self::default();
        for note in pages.iter().flat_map(Page::note_refs) {
            match note {
                NoteRef::Footnote(id) => {
                    let next = notes.footnotes.len() as u32 + 1;
                    notes.footnotes.entry(id).or_insert(next);
                }
                NoteRef::Endnote(id) => {
                    let next = notes.endnotes.len() as u32 + 1;
                    notes.endnotes.entry(id).or_insert(next);
                }
            }
        }
        notes
    }

    fn scan(&mut self, para: &Paragraph) {
        for run in &para.runs {
            match &run.content {
                RunContent::FootnoteRef { id } => {
                    let next = self.footnotes.len() as u32 + 1;
                    self.footnotes.entry(*id).or_insert(next);
                }
                RunContent::EndnoteRef { id } => {
                    let next = self.endnotes.len() as u32 + 1;
                    self.endnotes.entry(*id).or_insert(next);
                }
                RunContent::Textbox { textbox } => {
                    for inner in &textbox.paragraphs {
                        self.scan(inner);
                    }
                }
                _ => {}
            }
        }
    }
}

impl NoteNumbering for FirstReferenceNotes {
    fn footnote_number(&self, id: u32) -> u32 {
        self.footnotes.get(&id).copied().unwrap_or(id)
    }

    fn endnote_number(&self, id: u32) -> u32 {
        self.endnotes.get(&id).copied().unwrap_or(id)
    }
}

fn to_roman(mut n: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut result = String::new();
    for &(value, numeral) in TABLE {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    result
}

/// 1 -> a, 26 -> z, 27 -> aa.
fn to_letters(value: u32, base: u8) -> String {
    if value == 0 {
        return String::new();
    }
    let mut n = value - 1;
    let mut result = String::new();
    loop {
        result.insert(0, (base + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

pub fn format_number(value: u32, format: NumberFormat) -> String {
    match format {
        NumberFormat::Decimal => value.to_string(),
        NumberFormat::DecimalZero => format!("{value:02}"),
        NumberFormat::LowerLetter => to_letters(value, b'a'),
        NumberFormat::UpperLetter => to_letters(value, b'A'),
        NumberFormat::LowerRoman => to_roman(value),
        NumberFormat::UpperRoman => to_roman(value).to_uppercase(),
        NumberFormat::Bullet | NumberFormat::None => String::new(),
    }
}

/// Map Symbol-font private-use bullets (U+F0xx) to Unicode.
pub fn normalize_bullet_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (0xF000..=0xF0FF).contains(&cp) {
                symbol_pua_to_unicode(cp).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

fn symbol_pua_to_unicode(cp: u32) -> Option<char> {
    let sym = cp - 0xF000;
    let mapped = match sym {
        0xB7 => '\u{2022}', // •
        0xA7 => '\u{25A0}', // ■
        0xA8 => '\u{25CB}', // ○
        0xD8 => '\u{2666}', // ◆
        0x76 => '\u{221A}', // √
        0x6F => '\u{25A1}', // □
        _ => return char::from_u32(sym),
    };
    Some(mapped)
}

/// Text before the first non-text run, with tabs kept as whitespace.
fn leading_text(para: &Paragraph) -> String {
    let mut out = String::new();
    for run in &para.runs {
        match &run.content {
            RunContent::Text { text } => out.push_str(text),
            RunContent::Tab => out.push('\t'),
            _ => break,
        }
        if out.len() > 16 {
            break;
        }
    }
    out
}

/// Leading text already looks like a typed list marker: `1.`, `1)`, `a.`,
/// `iv)`, or a bullet character, followed by whitespace.
pub fn is_manual_marker(text: &str) -> bool {
    let text = text.trim_start_matches([' ', '\u{a0}']);
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if matches!(first, '•' | '-' | '*' | '–' | '·' | '◦' | '▪') {
        return chars.next().is_some_and(char::is_whitespace);
    }

    let token: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if token.is_empty() {
        return false;
    }
    let mut rest = text[token.len()..].chars();
    if !matches!(rest.next(), Some('.' | ')')) || !rest.next().is_some_and(char::is_whitespace) {
        return false;
    }
    let is_number = token.chars().all(|c| c.is_ascii_digit()) && token.len() <= 3;
    let is_letter = token.len() == 1 && token.chars().all(|c| c.is_ascii_alphabetic());
    let is_roman = token.len() <= 5
        && token
            .chars()
            .all(|c| matches!(c.to_ascii_lowercase(), 'i' | 'v' | 'x' | 'l' | 'c' | 'd' | 'm'));
    is_number || is_letter || is_roman
}

/// Running counters of one document build. Create a fresh one per layout pass.
#[derive(Debug, Default, Clone)]
pub struct NumberingState {
    counters: HashMap<(String, u8), u32>,
    last_level: HashMap<String, u8>,
}

impl NumberingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counters.clear();
        self.last_level.clear();
    }

    pub fn counter(&self, num_id: &str, level: u8) -> Option<u32> {
        self.counters.get(&(num_id.to_string(), level)).copied()
    }

    /// Advance the counter for `num_ref` and return the formatted marker text.
    /// `None` when the reference has no definition.
    pub fn advance(
        &mut self,
        provider: &dyn NumberingProvider,
        num_ref: &NumberingRef,
    ) -> Option<String> {
        let def = provider.level(&num_ref.num_id, num_ref.level)?;
        let id = num_ref.num_id.as_str();
        let level = num_ref.level;

        if let Some(prev) = self.last_level.get(id).copied()
            && level <= prev
        {
            for deeper in (level + 1)..=prev {
                let restarts = provider
                    .level(id, deeper)
                    .is_none_or(|d| d.restart_after_higher);
                if restarts {
                    self.counters.remove(&(id.to_string(), deeper));
                }
            }
        }
        self.last_level.insert(id.to_string(), level);

        let current = *self
            .counters
            .entry((id.to_string(), level))
            .and_modify(|c| *c += 1)
            .or_insert(def.start);

        Some(self.format_marker(provider, id, level, &def, current))
    }

    fn format_marker(
        &self,
        provider: &dyn NumberingProvider,
        id: &str,
        level: u8,
        def: &LevelDefinition,
        current: u32,
    ) -> String {
        if def.format == NumberFormat::Bullet {
            let text = normalize_bullet_text(&def.text);
            return if text.is_empty() { "\u{2022}".to_string() } else { text };
        }
        if def.text.is_empty() {
            return format_number(current, def.format);
        }
        let mut label = def.text.clone();
        for idx in 0..9u8 {
            let placeholder = format!("%{}", idx + 1);
            if !label.contains(&placeholder) {
                continue;
            }
            let other = provider.level(id, idx);
            let value = if idx == level {
                current
            } else {
                self.counter(id, idx)
                    .unwrap_or_else(|| other.as_ref().map(|d| d.start).unwrap_or(1))
            };
            let format = other.map(|d| d.format).unwrap_or(NumberFormat::Decimal);
            label = label.replace(&placeholder, &format_number(value, format));
        }
        label
    }
}

/// Paragraph indentation in points. `first_line` is the x of the first line,
/// `left` the x of every following line, both from the column's left edge.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResolvedIndent {
    pub left: f32,
    pub right: f32,
    pub first_line: f32,
}

impl ResolvedIndent {
    pub fn hanging(&self) -> f32 {
        self.left - self.first_line
    }
}

fn level_indent(def: &LevelDefinition) -> Indent {
    Indent {
        left: def.indent_left,
        right: None,
        first_line: def.first_line,
        hanging: def.hanging,
    }
}

/// Field-wise merge: first `Some` wins.
fn merge_indents(layers: &[&Indent]) -> Indent {
    let pick = |f: fn(&Indent) -> Option<f32>| layers.iter().find_map(|i| f(i));
    Indent {
        left: pick(|i| i.left),
        right: pick(|i| i.right),
        first_line: pick(|i| i.first_line),
        hanging: pick(|i| i.hanging),
    }
}

/// Compose indentation field by field: explicit paragraph indent, then the
/// numbering level, then the paragraph style. With `snap_to_level` the style
/// layer is dropped so the paragraph sits exactly on the level indent.
pub fn resolve_indent(
    explicit: &Indent,
    level: Option<&Indent>,
    style: &Indent,
    snap_to_level: bool,
) -> ResolvedIndent {
    let empty = Indent::default();
    let level = level.unwrap_or(&empty);
    let merged = if snap_to_level {
        merge_indents(&[explicit, level])
    } else {
        merge_indents(&[explicit, level, style])
    };

    let left = merged.left.unwrap_or(0.0);
    let first_offset = merged.first_line.unwrap_or(0.0);
    let first_line = match merged.hanging {
        Some(hanging) if first_offset == 0.0 => left - hanging,
        _ => left + first_offset,
    };
    ResolvedIndent {
        left,
        right: merged.right.unwrap_or(0.0),
        first_line,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub ordinal: usize,
    pub level: u8,
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListGroup {
    pub num_id: String,
    pub items: Vec<ListItem>,
}

/// Runs of consecutive paragraphs that share a numbering id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListTree {
    pub groups: Vec<ListGroup>,
}

impl ListTree {
    pub fn build(paragraphs: &[&Paragraph]) -> Self {
        let mut groups: Vec<ListGroup> = Vec::new();
        let mut open: Option<ListGroup> = None;
        let mut stack: Vec<u8> = Vec::new();

        for (ordinal, para) in paragraphs.iter().enumerate() {
            let Some(num_ref) = &para.numbering else {
                groups.extend(open.take());
                continue;
            };
            if open.as_ref().is_some_and(|g| g.num_id != num_ref.num_id) {
                groups.extend(open.take());
            }
            let group = open.get_or_insert_with(|| {
                stack.clear();
                ListGroup {
                    num_id: num_ref.num_id.clone(),
                    items: Vec::new(),
                }
            });
            while stack.last().is_some_and(|&l| l > num_ref.level) {
                stack.pop();
            }
            if stack.last() != Some(&num_ref.level) {
                stack.push(num_ref.level);
            }
            group.items.push(ListItem {
                ordinal,
                level: num_ref.level,
                depth: stack.len() - 1,
            });
        }
        groups.extend(open);
        Self { groups }
    }

    pub fn item(&self, ordinal: usize) -> Option<&ListItem> {
        self.groups
            .iter()
            .flat_map(|g| g.items.iter())
            .find(|i| i.ordinal == ordinal)
    }

    /// Snap to the computed level indent only without an explicit indent,
    /// without an instance override, and under a list-like paragraph style.
    pub fn should_autocorrect(
        &self,
        ordinal: usize,
        para: &Paragraph,
        provider: &dyn NumberingProvider,
    ) -> bool {
        let Some(num_ref) = &para.numbering else {
            return false;
        };
        self.item(ordinal).is_some()
            && para.indent.is_empty()
            && !provider.has_override(&num_ref.num_id)
            && para.style.is_list_like()
    }
}

/// Numbering decisions for one paragraph.
#[derive(Clone, Debug, PartialEq)]
pub struct ListEntry {
    /// Marker text; `None` when suppressed because the text carries its own.
    pub marker: Option<String>,
    pub marker_style: Option<TextStyle>,
    pub tab: Option<f32>,
    pub level: u8,
    pub depth: usize,
    pub autocorrect: bool,
    pub level_indent: Indent,
}

impl ListEntry {
    pub fn indent(&self, para: &Paragraph) -> ResolvedIndent {
        resolve_indent(
            &para.indent,
            Some(&self.level_indent),
            &para.style.indent,
            self.autocorrect,
        )
    }
}

/// Numbering for every paragraph of a document, indexed by its position in
/// [`Document::paragraphs_in_order`].
#[derive(Clone, Debug, Default)]
pub struct ListPlan {
    entries: Vec<Option<ListEntry>>,
}

impl ListPlan {
    pub fn build(doc: &Document) -> Self {
        Self::build_with(&doc.paragraphs_in_order(), &doc.numbering)
    }

    pub fn build_with(paragraphs: &[&Paragraph], provider: &dyn NumberingProvider) -> Self {
        let tree = ListTree::build(paragraphs);
        let mut state = NumberingState::new();
        let mut entries = Vec::with_capacity(paragraphs.len());

        for (ordinal, para) in paragraphs.iter().enumerate() {
            let Some(num_ref) = &para.numbering else {
                entries.push(None);
                continue;
            };
            let Some(def) = provider.level(&num_ref.num_id, num_ref.level) else {
                log::debug!("numbering {}:{} has no definition", num_ref.num_id, num_ref.level);
                entries.push(None);
                continue;
            };
            let depth = tree.item(ordinal).map(|i| i.depth).unwrap_or(0);

            let marker = if is_manual_marker(&leading_text(para)) {
                None
            } else {
                state.advance(provider, num_ref).filter(|m| !m.is_empty())
            };

            let mut level_indent = level_indent(&def);
            let autocorrect = tree.should_autocorrect(ordinal, para, provider);
            if autocorrect && level_indent.left.is_none() {
                level_indent.left = Some(DEFAULT_LEVEL_STEP * (depth as f32 + 1.0));
                level_indent.hanging = level_indent.hanging.or(Some(DEFAULT_HANGING));
            }

            entries.push(Some(ListEntry {
                marker,
                marker_style: def.marker_style.clone(),
                tab: def.tab,
                level: num_ref.level,
                depth,
                autocorrect,
                level_indent,
            }));
        }
        Self { entries }
    }

    pub fn entry(&self, ordinal: usize) -> Option<&ListEntry> {
        self.entries.get(ordinal).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::{AbstractNumbering, LevelOverride, NumberingInstance, ParagraphStyle};

    fn level(format: NumberFormat, text: &str, left: f32) -> LevelDefinition {
        LevelDefinition {
            format,
            text: text.to_string(),
            start: 1,
            restart_after_higher: true,
            indent_left: Some(left),
            hanging: Some(18.0),
            first_line: None,
            tab: None,
            marker_style: None,
        }
    }

    fn definitions() -> NumberingDefinitions {
        let mut levels = BTreeMap::new();
        levels.insert(0, level(NumberFormat::Decimal, "%1.", 36.0));
        levels.insert(1, level(NumberFormat::LowerLetter, "%1.%2)", 72.0));
        let mut defs = NumberingDefinitions::default();
        defs.abstracts
            .insert("A".into(), AbstractNumbering { levels });
        defs.instances.insert(
            "1".into(),
            NumberingInstance {
                abstract_id: "A".into(),
                overrides: BTreeMap::new(),
            },
        );
        defs
    }

    fn item(text: &str, level: u8) -> Paragraph {
        Paragraph {
            numbering: Some(NumberingRef {
                num_id: "1".into(),
                level,
            }),
            ..Paragraph::plain(text, TextStyle::default())
        }
    }

    #[test]
    fn formats_cover_roman_and_letters() {
        assert_eq!(format_number(14, NumberFormat::UpperRoman), "XIV");
        assert_eq!(format_number(27, NumberFormat::LowerLetter), "aa");
        assert_eq!(format_number(3, NumberFormat::DecimalZero), "03");
        assert_eq!(format_number(3, NumberFormat::None), "");
    }

    #[test]
    fn deeper_levels_restart_after_shallower_advance() {
        let defs = definitions();
        let mut state = NumberingState::new();
        let r0 = NumberingRef { num_id: "1".into(), level: 0 };
        let r1 = NumberingRef { num_id: "1".into(), level: 1 };
        assert_eq!(state.advance(&defs, &r0).as_deref(), Some("1."));
        assert_eq!(state.advance(&defs, &r1).as_deref(), Some("1.a)"));
        assert_eq!(state.advance(&defs, &r1).as_deref(), Some("1.b)"));
        assert_eq!(state.advance(&defs, &r0).as_deref(), Some("2."));
        assert_eq!(state.advance(&defs, &r1).as_deref(), Some("2.a)"));
        state.reset();
        assert_eq!(state.advance(&defs, &r0).as_deref(), Some("1."));
    }

    #[test]
    fn instance_override_sets_start() {
        let mut defs = definitions();
        let mut overrides = BTreeMap::new();
        overrides.insert(0, LevelOverride { start: Some(5) });
        defs.instances.insert(
            "2".into(),
            NumberingInstance {
                abstract_id: "A".into(),
                overrides,
            },
        );
        let mut state = NumberingState::new();
        let r = NumberingRef { num_id: "2".into(), level: 0 };
        assert_eq!(state.advance(&defs, &r).as_deref(), Some("5."));
        assert!(defs.has_override("2"));
        assert!(!defs.has_override("1"));
    }

    #[test]
    fn manual_markers_are_recognised() {
        for text in ["1. Intro", "12) x", "a. item", "iv) four", "• dot", "- dash", "*\tstar", "– en"] {
            assert!(is_manual_marker(text), "{text}");
        }
        for text in ["Intro", "1.5 litres", "e.g. this", "-dash", "Hello. World", ""] {
            assert!(!is_manual_marker(text), "{text}");
        }
    }

    #[test]
    fn rewound_marker_does_not_consume_counter() {
        let defs = definitions();
        let paras = [item("first", 0), item("2. typed", 0), item("third", 0)];
        let refs: Vec<&Paragraph> = paras.iter().collect();
        let plan = ListPlan::build_with(&refs, &defs);
        assert_eq!(plan.entry(0).unwrap().marker.as_deref(), Some("1."));
        assert_eq!(plan.entry(1).unwrap().marker, None);
        assert_eq!(plan.entry(2).unwrap().marker.as_deref(), Some("2."));
    }

    #[test]
    fn hanging_without_first_line_moves_first_line_left() {
        let level = Indent {
            left: Some(36.0),
            hanging: Some(18.0),
            ..Indent::default()
        };
        let resolved = resolve_indent(&Indent::default(), Some(&level), &Indent::default(), true);
        assert_eq!(resolved.first_line, 18.0);
        assert_eq!(resolved.hanging(), 18.0);
    }

    #[test]
    fn explicit_indent_beats_level_beats_style() {
        let explicit = Indent {
            right: Some(9.0),
            ..Indent::default()
        };
        let level = Indent {
            left: Some(36.0),
            right: Some(1.0),
            ..Indent::default()
        };
        let style = Indent {
            left: Some(10.0),
            first_line: Some(5.0),
            ..Indent::default()
        };
        let r = resolve_indent(&explicit, Some(&level), &style, false);
        assert_eq!((r.left, r.right, r.first_line), (36.0, 9.0, 41.0));
        let r = resolve_indent(&explicit, Some(&level), &style, true);
        assert_eq!((r.left, r.right, r.first_line), (36.0, 9.0, 36.0));
    }

    #[test]
    fn level_indent_beats_flush_style_without_autocorrect() {
        let level = Indent {
            left: Some(36.0),
            hanging: Some(18.0),
            ..Indent::default()
        };
        let style = Indent {
            left: Some(0.0),
            ..Indent::default()
        };
        let r = resolve_indent(&Indent::default(), Some(&level), &style, false);
        assert_eq!((r.left, r.first_line), (36.0, 18.0));
    }

    #[test]
    fn normal_style_list_item_uses_level_indent() {
        let defs = definitions();
        let mut para = item("x", 0);
        para.style.indent.left = Some(0.0);
        let refs = [&para];
        let plan = ListPlan::build_with(&refs, &defs);
        let entry = plan.entry(0).unwrap();
        assert!(!entry.autocorrect);
        let expected = entry.level_indent.left.unwrap();
        assert!(expected > 0.0);
        assert_eq!(entry.indent(&para).left, expected);
    }

    #[test]
    fn list_tree_tracks_depth_and_groups() {
        let plain = Paragraph::plain("body", TextStyle::default());
        let paras = [item("a", 0), item("b", 1), item("c", 0), plain, item("d", 2)];
        let refs: Vec<&Paragraph> = paras.iter().collect();
        let tree = ListTree::build(&refs);
        assert_eq!(tree.groups.len(), 2);
        let depths: Vec<usize> = tree.groups[0].items.iter().map(|i| i.depth).collect();
        assert_eq!(depths, vec![0, 1, 0]);
        assert_eq!(tree.item(4).unwrap().depth, 0);
        assert!(tree.item(3).is_none());
    }

    #[test]
    fn autocorrect_requires_list_style_and_no_override() {
        let defs = definitions();
        let mut para = item("x", 0);
        let refs = [&para];
        let tree = ListTree::build(&refs);
        assert!(!tree.should_autocorrect(0, &para, &defs));

        para.style = ParagraphStyle {
            name: Some("List Paragraph".into()),
            ..ParagraphStyle::default()
        };
        assert!(tree.should_autocorrect(0, &para, &defs));

        para.indent.left = Some(4.0);
        assert!(!tree.should_autocorrect(0, &para, &defs));
    }

    #[test]
    fn notes_are_numbered_by_first_reference() {
        use crate::model::{Block, Run};
        let mut para = Paragraph::default();
        for id in [7, 3, 7] {
            para.runs.push(Run {
                style: TextStyle::default(),
                hyperlink: None,
                content: RunContent::FootnoteRef { id },
            });
        }
        let doc = Document {
            blocks: vec![Block::Paragraph(para)],
            ..Document::default()
        };
        let notes = FirstReferenceNotes::from_document(&doc);
        assert_eq!(notes.footnote_number(7), 1);
        assert_eq!(notes.footnote_number(3), 2);
        assert_eq!(notes.footnote_number(99), 99);
    }
}
