//! Fixed project skeleton written by `fam init`.

const ENV: &str = r#"# Database
DATABASE_URL=sqlite:///./app.db

# App settings
DEBUG=true
SECRET_KEY=change-me-in-production
ALLOWED_ORIGINS=http://localhost:3000,http://127.0.0.1:3000
"#;

const REQUIREMENTS: &str = r#"fastapi>=0.104.0
uvicorn[standard]>=0.24.0
sqlalchemy>=2.0.0
alembic>=1.12.0
python-dotenv>=1.0.0
python-multipart>=0.0.6
pydantic>=2.0.0
ruff>=0.4.0
"#;

const GITIGNORE: &str = r#"__pycache__/
*.py[cod]
.venv/
venv/
env/
.env
*.db
.ruff_cache/
.pytest_cache/
"#;

const DATABASE: &str = r#"import os

from dotenv import load_dotenv
from sqlalchemy import create_engine
from sqlalchemy.orm import declarative_base, sessionmaker

load_dotenv()

DATABASE_URL = os.getenv("DATABASE_URL", "sqlite:///./app.db")

engine = create_engine(
    DATABASE_URL,
    connect_args={"check_same_thread": False} if DATABASE_URL.startswith("sqlite") else {},
)

SessionLocal = sessionmaker(autocommit=False, autoflush=False, bind=engine)
Base = declarative_base()


def get_db():
    db = SessionLocal()
    try:
        yield db
    finally:
        db.close()
"#;

const BASE_MIXIN: &str = r#"from sqlalchemy import Column, DateTime, Integer
from sqlalchemy.orm import declared_attr
from sqlalchemy.sql import func


class BaseMixin:
    """Columns shared by every model."""

    @declared_attr
    def id(cls):
        return Column(Integer, primary_key=True, autoincrement=True)

    @declared_attr
    def created_at(cls):
        return Column(DateTime, default=func.now(), nullable=False)

    @declared_attr
    def updated_at(cls):
        return Column(DateTime, default=func.now(), onupdate=func.now(), nullable=False)

    def to_dict(self):
        return {c.name: getattr(self, c.name) for c in self.__table__.columns}
"#;

const SEEDERS_INIT: &str = r#"from .base_seeder import BaseSeeder

__all__ = ["BaseSeeder"]
"#;

const BASE_SEEDER: &str = r#"import logging
from typing import Any, List, Type

from sqlalchemy.orm import Session

logger = logging.getLogger(__name__)


class BaseSeeder:
    """Base class for data seeders."""

    @property
    def model(self) -> Type:
        raise NotImplementedError("Subclasses must define `model`")

    @property
    def data(self) -> List[Any]:
        raise NotImplementedError("Subclasses must define `data`")

    def run(self, db: Session) -> None:
        """Insert every row of `data` that does not exist yet."""
        try:
            for item in self.data:
                exists = db.query(self.model).filter_by(**item).first()
                if not exists:
                    db.add(self.model(**item))
            db.commit()
            logger.info("Seeder for %s done", self.model.__name__)
        except Exception as e:
            db.rollback()
            logger.error("Seeder for %s failed: %s", self.model.__name__, e)
            raise
"#;

const MAIN: &str = r#"import os

from dotenv import load_dotenv
from fastapi import FastAPI
from fastapi.middleware.cors import CORSMiddleware

load_dotenv()

app = FastAPI(
    title="FastAPI App",
    description="API generated with fastapi-maker",
    version="1.0.0",
)

app.add_middleware(
    CORSMiddleware,
    allow_origins=os.getenv("ALLOWED_ORIGINS", "*").split(","),
    allow_credentials=True,
    allow_methods=["*"],
    allow_headers=["*"],
)


@app.get("/")
def read_root():
    return {"message": "Welcome to FastAPI"}


@app.get("/health")
def health_check():
    return {"status": "healthy"}


if __name__ == "__main__":
    import uvicorn

    uvicorn.run("app.main:app", host="0.0.0.0", port=8000, reload=True)
"#;

const ALEMBIC_INI: &str = r#"[alembic]
script_location = alembic
prepend_sys_path = .
# sqlalchemy.url is read from DATABASE_URL in alembic/env.py

[loggers]
keys = root,sqlalchemy,alembic

[handlers]
keys = console

[formatters]
keys = generic

[logger_root]
level = WARN
handlers = console
qualname =

[logger_sqlalchemy]
level = WARN
handlers =
qualname = sqlalchemy.engine

[logger_alembic]
level = INFO
handlers =
qualname = alembic

[handler_console]
class = StreamHandler
args = (sys.stderr,)
level = NOTSET
formatter = generic

[formatter_generic]
format = %(levelname)-5.5s [%(name)s] %(message)s
datefmt = %H:%M:%S
"#;

const ALEMBIC_ENV: &str = r#"import os
from logging.config import fileConfig

from alembic import context
from dotenv import load_dotenv
from sqlalchemy import engine_from_config, pool

from app.db.database import Base

load_dotenv()

config = context.config
config.set_main_option("sqlalchemy.url", os.getenv("DATABASE_URL", "sqlite:///./app.db"))

if config.config_file_name is not None:
    fileConfig(config.config_file_name)

target_metadata = Base.metadata


def run_migrations_offline() -> None:
    context.configure(
        url=config.get_main_option("sqlalchemy.url"),
        target_metadata=target_metadata,
        literal_binds=True,
        dialect_opts={"paramstyle": "named"},
    )
    with context.begin_transaction():
        context.run_migrations()


def run_migrations_online() -> None:
    connectable = engine_from_config(
        config.get_section(config.config_ini_section, {}),
        prefix="sqlalchemy.",
        poolclass=pool.NullPool,
    )
    with connectable.connect() as connection:
        context.configure(connection=connection, target_metadata=target_metadata)
        with context.begin_transaction():
            context.run_migrations()


if context.is_offline_mode():
    run_migrations_offline()
else:
    run_migrations_online()
"#;

const SCRIPT_MAKO: &str = r#""""${message}

Revision ID: ${up_revision}
Revises: ${down_revision | comma,n}
Create Date: ${create_date}

"""
from typing import Sequence, Union

from alembic import op
import sqlalchemy as sa
${imports if imports else ""}

revision: str = ${repr(up_revision)}
down_revision: Union[str, None] = ${repr(down_revision)}
branch_labels: Union[str, Sequence[str], None] = ${repr(branch_labels)}
depends_on: Union[str, Sequence[str], None] = ${repr(depends_on)}


def upgrade() -> None:
    ${upgrades if upgrades else "pass"}


def downgrade() -> None:
    ${downgrades if downgrades else "pass"}
"#;

/// Relative path of the application module routers are registered in.
pub const MAIN_MODULE: &str = "app/main.py";

/// Relative path of the alembic environment models are registered in.
pub const ALEMBIC_ENV_MODULE: &str = "alembic/env.py";

/// Marker routers are included before.
pub const MAIN_GUARD: &str = "if __name__ == \"__main__\":";

/// Directories created even when they hold no file of their own.
pub fn skeleton_dirs() -> &'static [&'static str] {
    &["alembic/versions"]
}

/// `(relative path, content)` of every skeleton file, `fam.json` excluded.
pub fn skeleton_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (".env", ENV),
        ("requirements.txt", REQUIREMENTS),
        (".gitignore", GITIGNORE),
        ("alembic.ini", ALEMBIC_INI),
        (ALEMBIC_ENV_MODULE, ALEMBIC_ENV),
        ("alembic/script.py.mako", SCRIPT_MAKO),
        ("app/__init__.py", ""),
        (MAIN_MODULE, MAIN),
        ("app/db/__init__.py", ""),
        ("app/db/database.py", DATABASE),
        ("app/db/base_mixin.py", BASE_MIXIN),
        ("app/db/seeders/__init__.py", SEEDERS_INIT),
        ("app/db/seeders/base_seeder.py", BASE_SEEDER),
        ("app/api/__init__.py", ""),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton_paths_are_unique_and_relative() {
        let files = skeleton_files();
        let mut paths: Vec<&str> = files.iter().map(|(p, _)| *p).collect();
        assert!(paths.iter().all(|p| !p.starts_with('/')));
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), files.len());
    }

    #[test]
    fn test_registration_anchors_present() {
        assert!(MAIN.contains(MAIN_GUARD));
        assert!(ALEMBIC_ENV.contains("from app.db.database import Base"));
    }

    #[test]
    fn test_seeder_package_exports_base_seeder() {
        let files = skeleton_files();
        let content = |rel| files.iter().find(|(p, _)| *p == rel).map(|(_, c)| *c);
        assert!(content("app/db/seeders/__init__.py").unwrap().contains("from .base_seeder import BaseSeeder"));
        let seeder = content("app/db/seeders/base_seeder.py").unwrap();
        assert!(seeder.contains("class BaseSeeder:"));
        assert!(seeder.contains("def run(self, db: Session) -> None:"));
    }
}
