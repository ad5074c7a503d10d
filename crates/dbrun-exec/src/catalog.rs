//! Catalog introspection built on `execute`.

use dbrun_core::{Language, Outcome};

use crate::client::ExecutionClient;

impl ExecutionClient {
    /// List databases visible to the context.
    pub async fn get_databases(&mut self) -> Outcome {
        self.database_info("show databases").await
    }

    /// List tables in `database`.
    pub async fn get_tables(&mut self, database: &str) -> Outcome {
        self.database_info(&format!("show tables in {database}"))
            .await
    }

    /// Describe the columns of `database.table`.
    pub async fn get_schema(&mut self, database: &str, table: &str) -> Outcome {
        self.database_info(&format!("describe {database}.{table}"))
            .await
    }

    /// Run `sql` through the context's language. SQL contexts take the
    /// statement as-is; Python and Scala wrap it in a `display` call so
    /// the remote returns a table result.
    async fn database_info(&mut self, sql: &str) -> Outcome {
        let command = match self.info().language {
            Language::Sql => sql.to_string(),
            Language::Python | Language::Scala => format!("display(spark.sql(\"{sql}\"))"),
            language => {
                return Outcome::Failure(format!("Language {language} is not supported"));
            }
        };
        self.execute(&command, None).await
    }
}
