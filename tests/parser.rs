use inventory_ingest::{parse_all, IngestError, RowProblem, RowReader};

#[tokio::test]
async fn quoted_fields_keep_their_commas() -> anyhow::Result<()> {
    let input = "id,Product Name,Price\n1,\"Chips, Cheese Flavor\",35\n";
    let parsed = parse_all(input.as_bytes(), b',').await?;

    assert_eq!(parsed.headers, ["id", "Product Name", "Price"]);
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.rows[0].get("Product Name"), Some("Chips, Cheese Flavor"));
    assert_eq!(parsed.rows[0].get("Price"), Some("35"));
    Ok(())
}

#[tokio::test]
async fn header_names_are_trimmed_and_unquoted() -> anyhow::Result<()> {
    let input = "\u{feff}id, \"Product Name\" , Price \n 3 , soap ,  12 \n";
    let parsed = parse_all(input.as_bytes(), b',').await?;

    assert_eq!(parsed.headers, ["id", "Product Name", "Price"]);
    let row = &parsed.rows[0];
    assert_eq!(row.get("id"), Some("3"));
    assert_eq!(row.get("Product Name"), Some("soap"));
    assert_eq!(row.get("Price"), Some("12"));
    Ok(())
}

#[tokio::test]
async fn escaped_quotes_in_values_survive() -> anyhow::Result<()> {
    let input = "id,Product Name,Size\n1,\"\"\"Big\"\" Towel\",\"\"\"XL\"\"\"\n";
    let parsed = parse_all(input.as_bytes(), b',').await?;

    let row = &parsed.rows[0];
    assert_eq!(row.get("Product Name"), Some("\"Big\" Towel"));
    assert_eq!(row.get("Size"), Some("\"XL\""));
    Ok(())
}

#[tokio::test]
async fn blank_lines_are_skipped_and_lines_numbered_from_one() -> anyhow::Result<()> {
    let input = "\n   \nid,Product Name\n   \n1,towel\n \t \n2,hat\n";
    let parsed = parse_all(input.as_bytes(), b',').await?;

    assert_eq!(parsed.rows.len(), 2);
    assert!(parsed.rejected.is_empty());
    assert_eq!(parsed.rows[0].line(), 5);
    assert_eq!(parsed.rows[1].line(), 7);

    let parsed = parse_all("id,Product Name\n\n\n1,towel\n\n".as_bytes(), b',').await?;
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.data_lines(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_field_count_rejects_only_that_row() -> anyhow::Result<()> {
    let input = "id,Product Name,Price\n1,towel,100\n2,hat\n3,mat,50,extra\n4,cap,80\n";
    let parsed = parse_all(input.as_bytes(), b',').await?;

    let ids: Vec<_> = parsed.rows.iter().filter_map(|r| r.get("id")).collect();
    assert_eq!(ids, ["1", "4"]);
    assert_eq!(parsed.rejected.len(), 2);
    assert_eq!(parsed.rejected[0].line, 3);
    assert_eq!(
        parsed.rejected[0].problems,
        [RowProblem::FieldCountMismatch {
            expected: 3,
            found: 2
        }]
    );
    assert_eq!(parsed.rejected[1].line, 4);
    assert_eq!(parsed.data_lines(), 4);
    Ok(())
}

#[tokio::test]
async fn blank_cells_and_unknown_columns_read_as_absent() -> anyhow::Result<()> {
    let input = "id,Product Name,Size\n1,towel,\n";
    let parsed = parse_all(input.as_bytes(), b',').await?;
    let row = &parsed.rows[0];

    assert_eq!(row.get("Size"), None);
    assert!(row.has_column("Size"));
    assert_eq!(row.get("Supplier"), None);
    assert!(!row.has_column("Supplier"));
    Ok(())
}

#[tokio::test]
async fn header_without_data_is_malformed() {
    let err = parse_all("id,Product Name\n\n  \n".as_bytes(), b',')
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MalformedInput(_)), "{err}");

    let err = parse_all("".as_bytes(), b',').await.unwrap_err();
    assert!(matches!(err, IngestError::MalformedInput(_)), "{err}");
}

#[tokio::test]
async fn semicolon_delimiter() -> anyhow::Result<()> {
    let parsed = parse_all("id;Price\n9;1,50\n".as_bytes(), b';').await?;
    assert_eq!(parsed.rows[0].get("Price"), Some("1,50"));
    Ok(())
}

#[tokio::test]
async fn row_reader_yields_rows_lazily() -> anyhow::Result<()> {
    let input = "id,Product Name\n1,towel\n2\n3,hat\n";
    let mut reader = RowReader::new(input.as_bytes(), b',').await?;
    assert_eq!(reader.headers(), ["id", "Product Name"]);

    let first = reader.next_row().await?.expect("first row");
    assert_eq!(first.expect("valid row").get("id"), Some("1"));
    let second = reader.next_row().await?.expect("second row");
    assert_eq!(second.unwrap_err().line, 3);
    let third = reader.next_row().await?.expect("third row");
    assert_eq!(third.expect("valid row").get("Product Name"), Some("hat"));
    assert!(reader.next_row().await?.is_none());
    Ok(())
}
