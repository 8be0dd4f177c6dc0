//! Scaffold files for a new entity.
//!
//! The shapes written here are the ones the relationship engine patches
//! later: one model class with fields at member indentation, DTOs ending in a
//! `model_config` block, a service whose `model_to_dto` starts with a
//! `dto_dict = ...` statement and a repository with a `get_by_id` method.
use super::fill;

const MODEL: &str = r#"# ORM model for {{name}}
from sqlalchemy import Column, String

from app.db.base_mixin import BaseMixin
from app.db.database import Base


class {{Class}}(Base, BaseMixin):
    __tablename__ = "{{table}}"

    name = Column(String(100), nullable=False)
"#;

const REPOSITORY: &str = r#"# Repository for {{name}}
from typing import List, Optional

from sqlalchemy.orm import Session

from .{{name}}_model import {{Class}}


class {{Class}}Repository:
    def __init__(self, db: Session):
        self.db = db
        self.model = {{Class}}

    def get_all(self) -> List[{{Class}}]:
        return self.db.query(self.model).all()

    def get_by_id(self, id: int) -> Optional[{{Class}}]:
        return self.db.query(self.model).filter(self.model.id == id).first()

    def create(self, data: dict) -> {{Class}}:
        item = self.model(**data)
        self.db.add(item)
        self.db.commit()
        self.db.refresh(item)
        return item

    def update(self, id: int, data: dict) -> Optional[{{Class}}]:
        item = self.get_by_id(id)
        if not item:
            return None
        for key, value in data.items():
            setattr(item, key, value)
        self.db.commit()
        self.db.refresh(item)
        return item

    def delete(self, id: int) -> bool:
        item = self.get_by_id(id)
        if not item:
            return False
        self.db.delete(item)
        self.db.commit()
        return True
"#;

const SERVICE: &str = r#"# Service for {{name}}
from typing import List, Optional

from sqlalchemy.orm import Session

from .{{name}}_repository import {{Class}}Repository
from .dto.{{name}}_in_dto import {{Class}}InDto
from .dto.{{name}}_out_dto import {{Class}}OutDto
from .dto.{{name}}_update_dto import {{Class}}UpdateDto


class {{Class}}Service:
    def __init__(self, db: Session):
        self.repository = {{Class}}Repository(db)

    def model_to_dto(self, entity) -> Optional[{{Class}}OutDto]:
        if not entity:
            return None
        dto_dict = {
            column.name: getattr(entity, column.name)
            for column in entity.__table__.columns
        }
        return {{Class}}OutDto(**dto_dict)

    def get_all(self) -> List[{{Class}}OutDto]:
        return [self.model_to_dto(item) for item in self.repository.get_all()]

    def get_by_id(self, id: int) -> Optional[{{Class}}OutDto]:
        return self.model_to_dto(self.repository.get_by_id(id))

    def create(self, data: {{Class}}InDto) -> {{Class}}OutDto:
        return self.model_to_dto(self.repository.create(data.model_dump()))

    def update(self, id: int, data: {{Class}}UpdateDto) -> Optional[{{Class}}OutDto]:
        item = self.repository.update(id, data.model_dump(exclude_unset=True))
        return self.model_to_dto(item)

    def delete(self, id: int) -> bool:
        return self.repository.delete(id)
"#;

const ROUTER: &str = r#"# Router for {{name}}
from typing import List

from fastapi import APIRouter, Depends, HTTPException
from sqlalchemy.orm import Session

from app.db.database import get_db

from .{{name}}_service import {{Class}}Service
from .dto.{{name}}_in_dto import {{Class}}InDto
from .dto.{{name}}_out_dto import {{Class}}OutDto
from .dto.{{name}}_update_dto import {{Class}}UpdateDto

router = APIRouter(prefix="/{{table}}", tags=["{{Class}}"])


def get_service(db: Session = Depends(get_db)) -> {{Class}}Service:
    return {{Class}}Service(db)


@router.get("/", response_model=List[{{Class}}OutDto])
def list_{{table}}(service: {{Class}}Service = Depends(get_service)):
    return service.get_all()


@router.get("/{id}", response_model={{Class}}OutDto)
def get_{{name}}(id: int, service: {{Class}}Service = Depends(get_service)):
    item = service.get_by_id(id)
    if not item:
        raise HTTPException(status_code=404, detail="{{Class}} not found")
    return item


@router.post("/", response_model={{Class}}OutDto, status_code=201)
def create_{{name}}(data: {{Class}}InDto, service: {{Class}}Service = Depends(get_service)):
    return service.create(data)


@router.put("/{id}", response_model={{Class}}OutDto)
def update_{{name}}(
    id: int, data: {{Class}}UpdateDto, service: {{Class}}Service = Depends(get_service)
):
    item = service.update(id, data)
    if not item:
        raise HTTPException(status_code=404, detail="{{Class}} not found")
    return item


@router.delete("/{id}", status_code=204)
def delete_{{name}}(id: int, service: {{Class}}Service = Depends(get_service)):
    if not service.delete(id):
        raise HTTPException(status_code=404, detail="{{Class}} not found")
"#;

const IN_DTO: &str = r#"# Input DTO for {{name}}
from pydantic import BaseModel


class {{Class}}InDto(BaseModel):
    name: str

    model_config = {
        "json_schema_extra": {
            "example": {
                "name": "Example {{name}}"
            }
        }
    }
"#;

const OUT_DTO: &str = r#"# Output DTO for {{name}}
from datetime import datetime

from pydantic import BaseModel


class {{Class}}OutDto(BaseModel):
    id: int
    name: str
    created_at: datetime
    updated_at: datetime

    model_config = {
        "from_attributes": True,
        "json_schema_extra": {
            "example": {
                "id": 1,
                "name": "Example {{name}}",
                "created_at": "2025-01-01T00:00:00",
                "updated_at": "2025-01-01T00:00:00"
            }
        },
    }
"#;

const UPDATE_DTO: &str = r#"# Update DTO for {{name}}
from typing import Optional

from pydantic import BaseModel


class {{Class}}UpdateDto(BaseModel):
    name: Optional[str] = None

    model_config = {
        "json_schema_extra": {
            "example": {
                "name": "Updated {{name}}"
            }
        }
    }
"#;

const DTO_INIT: &str = r#"from .{{name}}_in_dto import {{Class}}InDto
from .{{name}}_out_dto import {{Class}}OutDto
from .{{name}}_update_dto import {{Class}}UpdateDto

__all__ = ["{{Class}}InDto", "{{Class}}OutDto", "{{Class}}UpdateDto"]
"#;

/// Every file of an entity scaffold as `(path relative to the entity
/// directory, content)`, in write order.
pub fn scaffold_files(entity: &str) -> Vec<(String, String)> {
    vec![
        ("__init__.py".to_string(), String::new()),
        (format!("{entity}_model.py"), fill(MODEL, entity)),
        (format!("{entity}_repository.py"), fill(REPOSITORY, entity)),
        (format!("{entity}_service.py"), fill(SERVICE, entity)),
        (format!("{entity}_router.py"), fill(ROUTER, entity)),
        ("dto/__init__.py".to_string(), fill(DTO_INIT, entity)),
        (format!("dto/{entity}_in_dto.py"), fill(IN_DTO, entity)),
        (format!("dto/{entity}_out_dto.py"), fill(OUT_DTO, entity)),
        (format!("dto/{entity}_update_dto.py"), fill(UPDATE_DTO, entity)),
    ]
}

/// `app.include_router(<name>_router)` line for the application module.
pub fn router_include(entity: &str) -> String {
    format!("app.include_router({entity}_router)")
}
