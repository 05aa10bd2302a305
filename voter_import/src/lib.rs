/*!

Import pipeline for the voter roster of a PEMIRA election.

This crate turns the sheets of an uploaded spreadsheet into the voter records
expected by the election backend. It knows nothing about file formats or
transport: readers hand it a `Workbook`, and the final call goes through an
`ImportBackend`.

The whole import is driven by an `ImportSession`:

```
use voter_import::builder::sheet_from_text;
use voter_import::*;

let workbook = Workbook {
    sheets: vec![sheet_from_text(
        "Sheet1",
        &[
            &["NIM Mahasiswa", "Nama", "Email Aktif"],
            &["0110221001", "Budi", "budi@x.com"],
        ],
    )],
};

let mut session = ImportSession::new();
session.load_workbook(workbook)?;
assert_eq!(session.apply_mapping()?, Stage::Preview);

let request = session.build_request()?;
assert_eq!(request.students[0].nim, "0110221001");
assert_eq!(request.students[0].batch, "");
# Ok::<(), PipelineError>(())
```

See the [manual] for the detection rules.
*/

pub mod builder;
pub mod manual;
mod mapping;
mod model;
mod policy;
mod records;
mod selection;
mod session;

pub use crate::mapping::{detect_mapping, ColumnMapping};
pub use crate::model::*;
pub use crate::records::{build_preview, detect_cohorts, PreviewSummary};
pub use crate::selection::{visible_ids, SelectionSet};
pub use crate::session::{ImportBackend, ImportSession, PendingSubmission, SheetStatus, Stage};
