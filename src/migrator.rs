use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_ledger_tables::Migration),
            Box::new(m20240101_000002_create_document_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_ledger_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_ledger_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MovementLog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MovementLog::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(MovementLog::DocType).string_len(32).not_null())
                        .col(ColumnDef::new(MovementLog::DocNo).string_len(32).not_null())
                        .col(ColumnDef::new(MovementLog::LineNo).integer().not_null())
                        .col(
                            ColumnDef::new(MovementLog::Cancelled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(MovementLog::DocDate).date().not_null())
                        .col(ColumnDef::new(MovementLog::Warehouse).string_len(32).not_null())
                        .col(ColumnDef::new(MovementLog::Source).string_len(64).not_null())
                        .col(ColumnDef::new(MovementLog::Item).string_len(64).not_null())
                        .col(ColumnDef::new(MovementLog::Batch).string_len(64).not_null())
                        .col(
                            ColumnDef::new(MovementLog::QtyIn)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(MovementLog::QtyIn2)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(MovementLog::QtyOut)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(MovementLog::Remark).string().null())
                        .col(ColumnDef::new(MovementLog::Actor).string_len(64).not_null())
                        .col(
                            ColumnDef::new(MovementLog::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_log_document")
                        .table(MovementLog::Table)
                        .col(MovementLog::DocType)
                        .col(MovementLog::DocNo)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_log_stock_key")
                        .table(MovementLog::Table)
                        .col(MovementLog::Warehouse)
                        .col(MovementLog::Item)
                        .col(MovementLog::Batch)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockSummary::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockSummary::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockSummary::Warehouse).string_len(32).not_null())
                        .col(ColumnDef::new(StockSummary::Source).string_len(64).not_null())
                        .col(ColumnDef::new(StockSummary::Item).string_len(64).not_null())
                        .col(ColumnDef::new(StockSummary::Batch).string_len(64).not_null())
                        .col(
                            ColumnDef::new(StockSummary::Received)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockSummary::TransferredIn)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockSummary::Consumed)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockSummary::Actor).string_len(64).not_null())
                        .col(
                            ColumnDef::new(StockSummary::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockSummary::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_stock_summary_key")
                        .table(StockSummary::Table)
                        .col(StockSummary::Warehouse)
                        .col(StockSummary::Source)
                        .col(StockSummary::Item)
                        .col(StockSummary::Batch)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(HistoryOfStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HistoryOfStock::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HistoryOfStock::Item).string_len(64).not_null())
                        .col(ColumnDef::new(HistoryOfStock::Batch).string_len(64).not_null())
                        .col(ColumnDef::new(HistoryOfStock::Source).string_len(64).not_null())
                        .col(
                            ColumnDef::new(HistoryOfStock::Cancelled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(HistoryOfStock::DocType).string_len(32).not_null())
                        .col(ColumnDef::new(HistoryOfStock::DocNo).string_len(32).not_null())
                        .col(ColumnDef::new(HistoryOfStock::LineNo).integer().not_null())
                        .col(ColumnDef::new(HistoryOfStock::Actor).string_len(64).not_null())
                        .col(
                            ColumnDef::new(HistoryOfStock::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_history_of_stock_identity")
                        .table(HistoryOfStock::Table)
                        .col(HistoryOfStock::Item)
                        .col(HistoryOfStock::Batch)
                        .col(HistoryOfStock::Source)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ActivityLog::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ActivityLog::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ActivityLog::Actor).string_len(64).not_null())
                        .col(ColumnDef::new(ActivityLog::Code).string_len(32).not_null())
                        .col(ColumnDef::new(ActivityLog::Category).string_len(64).not_null())
                        .col(
                            ColumnDef::new(ActivityLog::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ActivityLog::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(HistoryOfStock::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockSummary::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MovementLog::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MovementLog {
        Table,
        Id,
        DocType,
        DocNo,
        LineNo,
        Cancelled,
        DocDate,
        Warehouse,
        Source,
        Item,
        Batch,
        QtyIn,
        QtyIn2,
        QtyOut,
        Remark,
        Actor,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockSummary {
        Table,
        Id,
        Warehouse,
        Source,
        Item,
        Batch,
        Received,
        TransferredIn,
        Consumed,
        Actor,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum HistoryOfStock {
        Table,
        Id,
        Item,
        Batch,
        Source,
        Cancelled,
        DocType,
        DocNo,
        LineNo,
        Actor,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ActivityLog {
        Table,
        Id,
        Actor,
        Code,
        Category,
        CreatedAt,
    }
}

mod m20240101_000002_create_document_tables {

    use crate::models::DocumentType;
    use sea_orm_migration::prelude::*;
    use strum::IntoEnumIterator;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_document_tables"
        }
    }

    /// Header columns beyond doc_no, doc_date, warehouse, remark, actor, created_at.
    fn header_extras(doc_type: DocumentType) -> Vec<ColumnDef> {
        let col = |name: &str| ColumnDef::new(Alias::new(name));
        match doc_type {
            DocumentType::MaterialRequest | DocumentType::PurchaseOrderRequest => {
                vec![col("requested_by").string_len(64).null().to_owned()]
            }
            DocumentType::PurchaseOrder
            | DocumentType::PurchaseReceipt
            | DocumentType::PurchaseReturn => {
                vec![col("supplier").string_len(64).not_null().to_owned()]
            }
            DocumentType::MaterialTransfer | DocumentType::StockMutation => {
                vec![col("to_warehouse").string_len(32).not_null().to_owned()]
            }
            DocumentType::MaterialReceive => {
                vec![col("from_warehouse").string_len(32).not_null().to_owned()]
            }
            DocumentType::StockAdjustment => vec![col("reason").string().null().to_owned()],
            DocumentType::DirectReceipt | DocumentType::DirectDelivery => vec![
                col("kind").string_len(32).not_null().to_owned(),
                col("counterparty").string_len(64).null().to_owned(),
            ],
        }
    }

    fn header_table(doc_type: DocumentType) -> TableCreateStatement {
        let mut table = Table::create();
        table
            .table(Alias::new(doc_type.header_table()))
            .if_not_exists()
            .col(
                ColumnDef::new(Alias::new("doc_no"))
                    .string_len(32)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Alias::new("doc_date")).date().not_null())
            .col(ColumnDef::new(Alias::new("warehouse")).string_len(32).not_null());
        for mut extra in header_extras(doc_type) {
            table.col(&mut extra);
        }
        table.col(ColumnDef::new(Alias::new("remark")).string().null());
        if doc_type.tracks_status() {
            table.col(
                ColumnDef::new(Alias::new("status"))
                    .string_len(32)
                    .not_null()
                    .default("Outstanding"),
            );
        }
        table
            .col(ColumnDef::new(Alias::new("actor")).string_len(64).not_null())
            .col(
                ColumnDef::new(Alias::new("created_at"))
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .to_owned()
    }

    fn line_table(doc_type: DocumentType) -> TableCreateStatement {
        let mut table = Table::create();
        table
            .table(Alias::new(doc_type.line_table()))
            .if_not_exists()
            .col(ColumnDef::new(Alias::new("doc_no")).string_len(32).not_null())
            .col(ColumnDef::new(Alias::new("line_no")).integer().not_null())
            .col(ColumnDef::new(Alias::new("item")).string_len(64).not_null())
            .col(ColumnDef::new(Alias::new("batch")).string_len(64).not_null())
            .col(ColumnDef::new(Alias::new("source")).string_len(64).not_null())
            .col(
                ColumnDef::new(Alias::new("quantity"))
                    .decimal_len(19, 4)
                    .not_null(),
            )
            .col(
                ColumnDef::new(Alias::new("cancelled"))
                    .boolean()
                    .not_null()
                    .default(false),
            );
        if let Some(flag) = doc_type.line_flag() {
            table.col(
                ColumnDef::new(Alias::new(flag.column()))
                    .boolean()
                    .not_null()
                    .default(flag.value_for(false)),
            );
        }
        if doc_type.upstream().is_some() {
            table
                .col(ColumnDef::new(Alias::new("upstream_doc_no")).string_len(32).null())
                .col(ColumnDef::new(Alias::new("upstream_line_no")).integer().null());
        }
        table
            .col(ColumnDef::new(Alias::new("remark")).string().null())
            .primary_key(
                Index::create()
                    .col(Alias::new("doc_no"))
                    .col(Alias::new("line_no")),
            )
            .foreign_key(
                ForeignKey::create()
                    .from(Alias::new(doc_type.line_table()), Alias::new("doc_no"))
                    .to(Alias::new(doc_type.header_table()), Alias::new("doc_no")),
            )
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for doc_type in DocumentType::iter() {
                manager.create_table(header_table(doc_type)).await?;
                manager.create_table(line_table(doc_type)).await?;

                if doc_type.upstream().is_some() {
                    let index = format!("idx_{}_upstream", doc_type.line_table());
                    manager
                        .create_index(
                            Index::create()
                                .if_not_exists()
                                .name(index.as_str())
                                .table(Alias::new(doc_type.line_table()))
                                .col(Alias::new("upstream_doc_no"))
                                .col(Alias::new("upstream_line_no"))
                                .to_owned(),
                        )
                        .await?;
                }
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for doc_type in DocumentType::iter() {
                manager
                    .drop_table(
                        Table::drop()
                            .table(Alias::new(doc_type.line_table()))
                            .if_exists()
                            .to_owned(),
                    )
                    .await?;
                manager
                    .drop_table(
                        Table::drop()
                            .table(Alias::new(doc_type.header_table()))
                            .if_exists()
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }
    }
}
