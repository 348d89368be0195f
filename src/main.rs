use anyhow::{Context, Result};
use notebook_editor::{
    cell_drag_data, Cell, CellBody, CellConstructor, ClosestEdge, DropEvent, DropTarget,
    EditorConfig, EditorHost, EventType, KeyShortcut, LocalDocument, Modifier, NotebookEditor,
    ReplicatedDocument,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EditorConfig::load(&PathBuf::from(path))?,
        None => EditorConfig::default(),
    };
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .init();

    println!("Notebook Editor - Editing Session");
    println!("=================================\n");

    let host = EditorHost::new();
    let equation = CellConstructor::new("Equation", || Cell::formal(String::from("x = 0")))
        .with_description("Insert a formula")
        .with_shortcut(KeyShortcut::new([Modifier::Primary], "E"));
    let editor = NotebookEditor::mount(LocalDocument::new(), &host, config, vec![equation]);
    let session = editor.session();

    let events = Rc::new(RefCell::new(Vec::new()));
    let _observer = {
        let events = Rc::clone(&events);
        session.subscribe(move |event| events.borrow_mut().push(event.event.clone()))
    };

    println!("✓ Mounted editor on {}", session.handle());
    println!("  Constructors: {}", editor.registry().len());
    println!("  Shortcuts bound: {}", host.shortcuts.len());

    // Empty notebook: append a stem and fill it from the palette
    session.append_cell(Cell::stem())?;
    println!("\n✓ Appended stem cell");
    println!("  Cells: {}, active: {:?}", session.len(), session.active_cell());

    let text = editor
        .insert_commands()
        .into_iter()
        .find(|command| command.name == "Text")
        .context("rich text command missing")?;
    text.complete();
    println!("\n✓ Filled stem with rich text");

    let first = session.ids()[0];
    session.edit_rich_text(first, |text| text.push_str("Energy and mass"))?;

    // Shortcut inserts a formula after the active cell
    host.shortcuts.trigger(&KeyShortcut::new([Modifier::Primary], "E"));
    println!("\n✓ Inserted equation via shortcut");
    println!("  Cells: {}, active: {:?}", session.len(), session.active_cell());

    session.create_below(1)?;
    println!("\n✓ Created stem below the equation");

    // Drag the equation above the text
    let ids = session.ids();
    host.drag_drop.drop_on(DropEvent {
        source: cell_drag_data(ids[1]),
        target: Some(DropTarget {
            data: cell_drag_data(ids[0]),
            closest_edge: Some(ClosestEdge::Before),
        }),
    });
    println!("\n✓ Dropped equation before text");

    session.delete_backward(2)?;
    println!("\n✓ Deleted trailing stem");

    println!("\n📊 Notebook Structure:");
    for view in session.views() {
        let marker = if view.is_active { "*" } else { " " };
        match &view.body {
            CellBody::Stem => println!("  {}[{}] stem", marker, view.index),
            CellBody::RichText { path, .. } => println!("  {}[{}] text at {}", marker, view.index, path),
            CellBody::Formal { content, .. } => println!("  {}[{}] formal: {}", marker, view.index, content),
        }
    }

    let changes = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, EventType::DocumentChanged { .. }))
        .count();
    println!("\n🔗 Events:");
    println!("  Document changes observed: {}", changes);
    println!("  Total events: {}", events.borrow().len());
    println!("  Document version: {}", session.with_document(|doc| doc.version()));

    editor.unmount();
    println!("\n✅ Editor unmounted");
    println!("   Host registrations left: {}\n", host.drag_drop.monitor_count() + host.shortcuts.len());
    Ok(())
}
