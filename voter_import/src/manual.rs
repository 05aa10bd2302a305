/*!

This is the long-form manual for `voter_import` and `pemira-import`.

## Input files

The following formats are accepted:
* `.xlsx` Excel workbooks (Office Open XML)
* `.xls` legacy Excel workbooks
* `.csv` delimited text. The delimiter is guessed from the header line
  among `,`, `;`, tab and `|`, unless it is set in the configuration.
  A CSV file is read as a single sheet named `Sheet1`. It should be UTF-8:
  characters in another encoding are replaced by `�` with a warning.

Any other extension is rejected before the file is read.

The first row of a sheet is the header. Blank header cells are ignored. When
a header appears several times, only the first column with this header is
read. Lines where every cell is empty are skipped. A line with any content,
even whitespace or a value under an ignored header, is kept.

## Column mapping

Each sheet is mapped to four fields:

| field   | required | detected when the header contains  |
|---------|----------|------------------------------------|
| `NIM`   | yes      | `nim`, `nomor`, `induk`            |
| `Name`  | yes      | `nama`, `name`                     |
| `Email` | no       | `email`, `surel`                   |
| `Batch` | no       | `angkatan`, `batch`, `tahun`       |

Matching ignores case. The headers are scanned from left to right, and a
field is taken by the first header that matches it. A header is used for one
field only: a header such as `Email Name` that matches several fields which
are still free goes to the last of them in the table order (here `Email`).

Every field can be changed by hand. `Email` and `Batch` can also be set to
none. Changing the active sheet runs the detection again and forgets the
manual choices.

## Validation

Every non-blank line of the sheet becomes a record, nothing else is dropped.
Values are trimmed. Numbers are written without decimals when they are
whole, so a NIM stored as a number keeps its digits (but loses leading
zeros: store NIMs as text in the spreadsheet). A record is valid when both
its NIM and its name are non-empty. Invalid records are shown but can never
be selected.

## Batch policies

Each distinct batch value gets an access mode:
* `online` (default) voters log in and vote through the public web flow
* `offline` voters are checked in and voted for at a physical station

When no batch column is mapped, or when it is empty everywhere, this step is
skipped.

## Submission

All valid records are selected at first. The preview can be filtered by NIM
or name; selecting or clearing "all" only affects the rows that are shown.
The backend receives, in one call:

```json
{
  "students": [{"NIM": "0110221001", "Name": "Budi", "Email": "budi@x.com", "Batch": "2021"}],
  "batchConfig": {"2021": "offline"}
}
```

and answers with the counts `{"success": 8, "errors": 2, "total": 10}`.
Rows rejected by the backend are not retried: fix them in the spreadsheet and
run a new import.
*/
