//! End-to-end annotation commands over small documents.

use loom_annotate::{AnnotationConfig, AnnotationDescriptor, Applier, ApplierOptions};
use loom_dom::{Document, NodeId};
use loom_range::{BoundaryPoint, Range, Selection, SelectionHost};
use regex::Regex;

fn parse(markup: &str) -> (Document, NodeId) {
    let doc = Document::from_markup(markup).unwrap();
    let top = doc.first_child(doc.root()).unwrap();
    (doc, top)
}

fn range(doc: &Document, start: (NodeId, usize), end: (NodeId, usize)) -> Range {
    Range::from_points(
        doc,
        BoundaryPoint::new(start.0, start.1),
        BoundaryPoint::new(end.0, end.1),
    )
    .unwrap()
}

fn bold() -> Applier {
    Applier::new(AnnotationDescriptor::new(["b", "strong"], "bold"))
}

#[test]
fn bold_across_elements_then_undo_restores_markup() {
    let (mut doc, div) = parse("<div>ab<span>cd</span>ef</div>");
    let ab = doc.child_at(div, 0).unwrap();
    let ef = doc.child_at(div, 2).unwrap();
    let mut selected = range(&doc, (ab, 1), (ef, 1));
    let applier = bold();

    applier.apply_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(
        doc.outer_html(div),
        @r#"<div>a<b class="bold">b</b><span><b class="bold">cd</b></span><b class="bold">e</b>f</div>"#
    );

    applier.undo_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(div), @"<div>ab<span>cd</span>ef</div>");
    assert_eq!(selected.text(&doc).unwrap(), "bcde");
    let ab = doc.child_at(div, 0).unwrap();
    let ef = doc.child_at(div, 2).unwrap();
    assert_eq!(selected.start(), Ok(BoundaryPoint::new(ab, 1)));
    assert_eq!(selected.end(), Ok(BoundaryPoint::new(ef, 1)));
}

#[test]
fn applying_twice_changes_nothing() {
    let (mut doc, div) = parse("<div>ab<span>cd</span>ef</div>");
    let ab = doc.child_at(div, 0).unwrap();
    let ef = doc.child_at(div, 2).unwrap();
    let mut selected = range(&doc, (ab, 1), (ef, 1));
    let applier = bold();

    applier.apply_to_range(&mut doc, &mut selected).unwrap();
    let once = doc.outer_html(div);
    let markers = applier.is_applied_to_range(&doc, &selected).unwrap();

    applier.apply_to_range(&mut doc, &mut selected).unwrap();
    assert_eq!(doc.outer_html(div), once);
    assert_eq!(applier.is_applied_to_range(&doc, &selected).unwrap(), markers);
    assert_eq!(selected.text(&doc).unwrap(), "bcde");
}

#[test]
fn applying_twice_at_a_caret_changes_nothing() {
    let (mut doc, div) = parse("<div>ab<span>cd</span>ef</div>");
    let ab = doc.child_at(div, 0).unwrap();
    let mut caret = range(&doc, (ab, 1), (ab, 1));
    let applier = bold();

    applier.apply_to_range(&mut doc, &mut caret).unwrap();
    let once = doc.outer_html(div);
    let markers = applier.is_applied_to_range(&doc, &caret).unwrap();
    assert!(markers.is_some());

    applier.apply_to_range(&mut doc, &mut caret).unwrap();
    assert_eq!(doc.outer_html(div), once);
    assert_eq!(doc.text_content(div), "a\u{feff}bcdef");
    assert_eq!(applier.is_applied_to_range(&doc, &caret).unwrap(), markers);
}

#[test]
fn nested_markers_survive_toggling_every_range() {
    const MARKUP: &str = r#"<p><b class="bold">a<b class="bold">bc</b>d</b>e</p>"#;
    let points = |doc: &Document, p: NodeId| -> Vec<BoundaryPoint> {
        doc.descendants(p)
            .filter(|node| doc.is_text(*node))
            .flat_map(|node| (0..=doc.node_length(node)).map(move |offset| BoundaryPoint::new(node, offset)))
            .collect()
    };
    let (doc, p) = parse(MARKUP);
    let count = points(&doc, p).len();
    let applier = bold();

    for i in 0..count {
        for j in i + 1..count {
            let (mut doc, p) = parse(MARKUP);
            let all = points(&doc, p);
            let mut selected = Range::from_points(&doc, all[i], all[j]).unwrap();
            let text = selected.text(&doc).unwrap();

            for round in 0..2 {
                applier
                    .toggle_range(&mut doc, &mut selected)
                    .unwrap_or_else(|err| panic!("range {i}..{j}, toggle {round}: {err}"));
                assert_eq!(doc.text_content(p), "abcde", "range {i}..{j}, toggle {round}");
                assert_eq!(selected.text(&doc).unwrap(), text, "range {i}..{j}, toggle {round}");
            }
        }
    }
}

#[test]
fn toggle_twice_is_identity() {
    let (mut doc, div) = parse("<div>ab<span>cd</span>ef</div>");
    let ab = doc.child_at(div, 0).unwrap();
    let ef = doc.child_at(div, 2).unwrap();
    let mut selected = range(&doc, (ab, 1), (ef, 1));
    let applier = bold();

    applier.toggle_range(&mut doc, &mut selected).unwrap();
    assert!(applier.is_applied_to_range(&doc, &selected).unwrap().is_some());
    applier.toggle_range(&mut doc, &mut selected).unwrap();
    assert_eq!(applier.is_applied_to_range(&doc, &selected).unwrap(), None);
    assert_eq!(doc.outer_html(div), "<div>ab<span>cd</span>ef</div>");
}

#[test]
fn apply_fuses_with_equivalent_neighbour_only() {
    let (mut doc, p) = parse(r#"<p><b class="bold">ab</b>cd</p>"#);
    let cd = doc.child_at(p, 1).unwrap();
    let mut selected = Range::from_node_contents(&doc, cd).unwrap();
    bold().apply_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(p), @r#"<p><b class="bold">abcd</b></p>"#);
    assert_eq!(selected.text(&doc).unwrap(), "cd");

    let (mut doc, p) = parse(r#"<p><b class="bold" lang="en">ab</b>cd</p>"#);
    let cd = doc.child_at(p, 1).unwrap();
    let mut selected = Range::from_node_contents(&doc, cd).unwrap();
    bold().apply_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(
        doc.outer_html(p),
        @r#"<p><b class="bold" lang="en">ab</b><b class="bold">cd</b></p>"#
    );
}

#[test]
fn normalize_can_be_switched_off() {
    let (mut doc, p) = parse(r#"<p><b class="bold">ab</b>cd</p>"#);
    let cd = doc.child_at(p, 1).unwrap();
    let mut selected = Range::from_node_contents(&doc, cd).unwrap();
    let applier = Applier::with_options(
        AnnotationDescriptor::new(["b"], "bold"),
        ApplierOptions {
            normalize: false,
            ..ApplierOptions::default()
        },
    );
    applier.apply_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(
        doc.outer_html(p),
        @r#"<p><b class="bold">ab</b><b class="bold">cd</b></p>"#
    );
}

#[test]
fn undo_whole_marker_rejoins_text() {
    let (mut doc, p) = parse(r#"<p>a<b class="bold">bcd</b>e</p>"#);
    let b = doc.child_at(p, 1).unwrap();
    let bcd = doc.first_child(b).unwrap();
    let mut selected = Range::from_node_contents(&doc, bcd).unwrap();

    bold().undo_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(p), @"<p>abcde</p>");
    let text = doc.first_child(p).unwrap();
    assert_eq!(selected.start(), Ok(BoundaryPoint::new(text, 1)));
    assert_eq!(selected.end(), Ok(BoundaryPoint::new(text, 4)));
}

#[test]
fn similar_class_replaces_colour() {
    let colors = Regex::new("color-[a-z]+").unwrap();
    let blue = Applier::new(
        AnnotationDescriptor::new(["span"], "color-blue").with_similar_classes(colors.clone()),
    );
    let red = Applier::new(
        AnnotationDescriptor::new(["span"], "color-red").with_similar_classes(colors),
    );

    let (mut doc, p) = parse(r#"<p><span class="color-red">abc</span></p>"#);
    let span = doc.first_child(p).unwrap();
    let abc = doc.first_child(span).unwrap();
    let mut selected = Range::from_node_contents(&doc, abc).unwrap();
    assert!(red.is_applied_to_range(&doc, &selected).unwrap().is_some());
    assert_eq!(blue.is_applied_to_range(&doc, &selected).unwrap(), None);

    blue.apply_to_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(p), @r#"<p><span class="color-blue">abc</span></p>"#);
    assert_eq!(blue.is_applied_to_range(&doc, &selected).unwrap(), Some(vec![span]));
    assert_eq!(red.is_applied_to_range(&doc, &selected).unwrap(), None);
}

#[test]
fn selection_with_several_ranges() {
    let (mut doc, div) = parse("<div><p>one</p><p>two</p></div>");
    let one = doc.first_child(doc.child_at(div, 0).unwrap()).unwrap();
    let two = doc.first_child(doc.child_at(div, 1).unwrap()).unwrap();
    let mut selection = Selection::new();
    selection
        .add_range(&doc, Range::from_node_contents(&doc, one).unwrap())
        .unwrap();
    selection
        .add_range(&doc, range(&doc, (two, 1), (two, 2)))
        .unwrap();
    let applier = bold();

    assert_eq!(applier.is_applied_to_selection(&doc, &selection).unwrap(), None);
    applier.apply_to_selection(&mut doc, &mut selection).unwrap();
    insta::assert_snapshot!(
        doc.outer_html(div),
        @r#"<div><p><b class="bold">one</b></p><p>t<b class="bold">w</b>o</p></div>"#
    );
    assert_eq!(selection.range_count(), 2);
    assert_eq!(
        applier
            .is_applied_to_selection(&doc, &selection)
            .unwrap()
            .map(|markers| markers.len()),
        Some(2)
    );

    applier.toggle_selection(&mut doc, &mut selection).unwrap();
    insta::assert_snapshot!(doc.outer_html(div), @"<div><p>one</p><p>two</p></div>");
    assert_eq!(selection.text(&doc).unwrap(), "onew");
    assert!(!selection.is_backwards());
}

#[test]
fn empty_selection_is_never_applied() {
    let (doc, _) = parse("<p>x</p>");
    let selection = Selection::new();
    assert!(selection.ranges().is_empty());
    assert_eq!(bold().is_applied_to_selection(&doc, &selection).unwrap(), None);
}

#[test]
fn commands_from_config() {
    let config = AnnotationConfig::from_toml(
        r#"
[commands.bold]
tag_names = ["strong", "b"]
class_name = "bold"
"#,
    )
    .unwrap();
    let applier = config.applier("bold").unwrap();

    let (mut doc, p) = parse("<p>plain text</p>");
    let text = doc.first_child(p).unwrap();
    let mut selected = range(&doc, (text, 0), (text, 5));
    applier.toggle_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(p), @r#"<p><strong class="bold">plain</strong> text</p>"#);
    applier.toggle_range(&mut doc, &mut selected).unwrap();
    insta::assert_snapshot!(doc.outer_html(p), @"<p>plain text</p>");
}
