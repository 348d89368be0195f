/// Example: Two replicas of one notebook editing concurrently
///
/// This example demonstrates:
/// - Creating a replica of a shared document
/// - Editing each replica through its own session
/// - Shipping the missing part of a replica's state as an encoded update
/// - Merging concurrent edits and observing the reconciled focus

use anyhow::Result;
use notebook_editor::*;

type Session = EditorSession<f64, LocalDocument<f64>>;

/// Merge everything `from` has that `into` is missing
fn sync(into: &Session, from: &Session) -> Result<Commit> {
    let state = into.with_document(|doc| doc.state_vector());
    let update = from.with_document(|doc| doc.encode_delta(&state))?;
    println!("  → {} bytes", update.len());
    Ok(into.merge_remote(update)?)
}

fn main() -> Result<()> {
    println!("=== Notebook Editor: Collaborative Session Example ===\n");

    // Step 1: One document, two replicas
    println!("Step 1: Creating replicas...");
    let origin: LocalDocument<f64> = LocalDocument::new();
    let alice = EditorSession::new(origin.replica()?);
    let bob = EditorSession::new(origin);
    println!("  ✓ Bob's session on {}", bob.handle());

    // Step 2: Alice writes a paragraph and a number
    println!("\nStep 2: Alice edits...");
    alice.append_cell(Cell::rich_text())?;
    let text = alice.ids()[0];
    alice.edit_rich_text(text, |s| s.push_str("Measured gravity"))?;
    alice.add_after_active_cell(Cell::formal(9.81))?;
    println!("  ✓ Alice has {} cells", alice.len());

    // Step 3: Bob pulls Alice's update into his empty notebook
    println!("\nStep 3: Syncing Alice -> Bob...");
    let commit = sync(&bob, &alice)?;
    println!("  ✓ Bob merged {} changes (version {})", commit.changes, commit.version);
    println!("  ✓ Bob's active cell: {:?}", bob.active_cell());

    // Step 4: Both edit at once
    println!("\nStep 4: Concurrent edits...");
    bob.set_active_cell(Some(1));
    alice.delete_backward(1)?;
    bob.append_cell(Cell::formal(1.62))?;
    let text = alice.ids()[0];
    alice.replace_cell_with(0, Cell::formal(3.71))?;
    println!("  ✓ Alice deleted the gravity cell and replaced {}", text);

    sync(&bob, &alice)?;
    sync(&alice, &bob)?;
    println!("  ✓ Bob's active cell after merge: {:?}", bob.active_cell());

    // Step 5: Compare
    println!("\nStep 5: Comparing replicas...");
    let converged = alice.with_notebook(|a| bob.with_notebook(|b| a == b));
    println!("  ✓ Replicas converged: {}", converged);
    for (index, cell) in bob.with_notebook(|nb| nb.cells().to_vec()).iter().enumerate() {
        println!("  [{}] {:?}", index, cell.kind());
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
