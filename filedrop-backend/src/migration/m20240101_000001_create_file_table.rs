use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // A database written by an older deployment already has this table
        manager
            .create_table(
                Table::create()
                    .table(File::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(File::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(File::FileName).string().not_null())
                    .col(ColumnDef::new(File::LastModified).string().not_null())
                    .col(ColumnDef::new(File::UploadedAt).string().not_null())
                    .col(ColumnDef::new(File::Size).big_integer().not_null())
                    .col(ColumnDef::new(File::MimeType).string())
                    .col(ColumnDef::new(File::Path).string())
                    .col(ColumnDef::new(File::Content).binary())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_file_name")
                    .table(File::Table)
                    .col(File::FileName)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(File::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum File {
    #[sea_orm(iden = "File")]
    Table,
    Id,
    FileName,
    LastModified,
    UploadedAt,
    Size,
    #[sea_orm(iden = "mimeType")]
    MimeType,
    Path,
    Content,
}
